//! Title, tag and subtitle text helpers used by the ingestion pipeline.

/// Titles an extraction source makes up rather than reads from the page.
/// These are worth replacing with something derived from the URL.
pub fn is_synthetic_title(title: &str) -> bool {
    let lower = title.to_lowercase();
    lower.contains("hls-") || lower.starts_with("video")
}

/// Whether a stored title is weak enough to overwrite with a resolved one.
pub fn should_replace_title(existing: &str) -> bool {
    let trimmed = existing.trim();
    trimmed.is_empty() || trimmed.contains("Queued") || trimmed.len() < 3
}

/// Derive a readable title from the last path segment of a URL.
/// `some_video_file.mp4` becomes `Some Video File`.
pub fn title_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim_end_matches('/');
    let segment = trimmed.rsplit('/').next()?;
    let segment = segment.split('?').next().unwrap_or(segment);
    let stem = segment.rsplit_once('.').map_or(segment, |(s, _)| s);

    let words: Vec<String> = stem
        .split(|c: char| c == '_' || c == '-' || c == '+')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Pick vocabulary words that appear in the title, case-insensitively.
pub fn keyword_tags(title: &str, vocabulary: &[String]) -> Vec<String> {
    let lower = title.to_lowercase();
    vocabulary
        .iter()
        .filter(|word| lower.contains(&word.to_lowercase()))
        .cloned()
        .collect()
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "this", "that", "are", "was", "you", "your", "video",
    "watch", "free", "full", "new", "best", "part", "episode",
];

/// Heuristic content tags: distinct words of four letters or more that are
/// not common filler, from the title and description.
pub fn derive_content_tags(title: &str, description: Option<&str>, limit: usize) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let text = match description {
        Some(desc) => format!("{title} {desc}"),
        None => title.to_string(),
    };

    for word in text.split(|c: char| !c.is_alphanumeric()) {
        let lower = word.to_lowercase();
        if lower.len() < 4 || STOPWORDS.contains(&lower.as_str()) {
            continue;
        }
        if lower.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if !tags.contains(&lower) {
            tags.push(lower);
        }
        if tags.len() >= limit {
            break;
        }
    }

    tags
}

/// Reduce a WebVTT document to its plain spoken text: headers, timing lines,
/// cue numbers and inline markup are dropped, consecutive duplicates merged.
pub fn flatten_subtitles(vtt: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for raw in vtt.lines() {
        let line = raw.trim();
        if line.is_empty()
            || line.starts_with("WEBVTT")
            || line.starts_with("Kind:")
            || line.starts_with("Language:")
            || line.starts_with("NOTE")
            || line.contains("-->")
        {
            continue;
        }
        if line.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        let cleaned = strip_markup(line);
        if cleaned.is_empty() {
            continue;
        }
        if lines.last().map(String::as_str) == Some(cleaned.as_str()) {
            continue;
        }
        lines.push(cleaned);
    }

    lines.join(" ")
}

fn strip_markup(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_titles_detected() {
        assert!(is_synthetic_title("hls-720p-master"));
        assert!(is_synthetic_title("Video 12345"));
        assert!(is_synthetic_title("video"));
        assert!(!is_synthetic_title("A Real Documentary"));
    }

    #[test]
    fn test_should_replace_weak_titles() {
        assert!(should_replace_title(""));
        assert!(should_replace_title("  "));
        assert!(should_replace_title("Queued item"));
        assert!(should_replace_title("ab"));
        assert!(!should_replace_title("Kept Title"));
    }

    #[test]
    fn test_title_from_url() {
        assert_eq!(
            title_from_url("https://cdn.example.com/media/my_great_video.mp4").as_deref(),
            Some("My Great Video")
        );
        assert_eq!(
            title_from_url("https://x.example/clips/one-two?token=abc").as_deref(),
            Some("One Two")
        );
        assert_eq!(title_from_url("https://x.example/"), None);
    }

    #[test]
    fn test_keyword_tags_matching() {
        let vocab = vec!["4k".to_string(), "vlog".to_string(), "pov".to_string()];
        let tags = keyword_tags("Morning VLOG in 4K", &vocab);
        assert_eq!(tags, vec!["4k".to_string(), "vlog".to_string()]);
    }

    #[test]
    fn test_derive_content_tags_filters_stopwords_and_short_words() {
        let tags = derive_content_tags(
            "The Mountain Hike 2024",
            Some("a long walk with friends in the mountain"),
            5,
        );
        assert!(tags.contains(&"mountain".to_string()));
        assert!(tags.contains(&"hike".to_string()));
        assert!(!tags.contains(&"the".to_string()));
        assert!(!tags.contains(&"2024".to_string()));
        // deduplicated
        assert_eq!(tags.iter().filter(|t| *t == "mountain").count(), 1);
    }

    #[test]
    fn test_flatten_subtitles() {
        let vtt = "WEBVTT\nKind: captions\nLanguage: en\n\n1\n00:00:01.000 --> 00:00:03.000\n<c>Hello there</c>\n\n2\n00:00:03.000 --> 00:00:05.000\nHello there\n\n3\n00:00:05.000 --> 00:00:08.000\nGeneral greeting\n";
        assert_eq!(flatten_subtitles(vtt), "Hello there General greeting");
    }

    #[test]
    fn test_flatten_subtitles_empty_document() {
        assert_eq!(flatten_subtitles("WEBVTT\n\n"), "");
    }
}
