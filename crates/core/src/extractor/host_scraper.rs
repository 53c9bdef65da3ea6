//! Host-specific page scraper.
//!
//! Some hosts embed the real stream location in a player-configuration
//! script instead of the page markup. This strategy fetches the page and
//! pattern-matches the known configuration call signatures.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::{debug, warn};

use super::{ExtractionResult, ExtractionStrategy};

static RE_HLS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"setVideoHLS\('([^']+)'\)").unwrap());
static RE_URL_HIGH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"setVideoUrlHigh\('([^']+)'\)").unwrap());
static RE_URL_LOW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"setVideoUrlLow\('([^']+)'\)").unwrap());
static RE_DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"setVideoDuration\((\d+)\)").unwrap());
static RE_THUMB_169: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"setThumbUrl169\('([^']+)'\)").unwrap());
static RE_THUMB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"setThumbUrl\('([^']+)'\)").unwrap());
static RE_POSTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"setPoster\('([^']+)'\)").unwrap());
static RE_PAGE_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<h2 class="page-title">\s*([^<]+?)\s*</h2>"#).unwrap());
static RE_OG_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<meta property="og:title" content="([^"]*)""#).unwrap());

/// Scraper for a single configured host.
pub struct HostScraper {
    client: reqwest::Client,
    host_marker: String,
}

impl HostScraper {
    pub fn new(client: reqwest::Client, host_marker: String) -> Self {
        Self {
            client,
            host_marker,
        }
    }

    /// Whether this scraper applies to the given reference.
    pub fn handles(&self, url: &str) -> bool {
        !self.host_marker.is_empty() && url.contains(&self.host_marker)
    }

    /// Extract everything the player configuration exposes from raw HTML.
    fn parse_page(html: &str) -> ExtractionResult {
        let capture = |re: &Regex| {
            re.captures(html)
                .map(|c| c[1].to_string())
                .filter(|s| !s.is_empty())
        };

        // Manifest stream beats direct files; high quality beats low.
        let stream_url = capture(&RE_HLS)
            .or_else(|| capture(&RE_URL_HIGH))
            .or_else(|| capture(&RE_URL_LOW));

        let thumbnail_url = capture(&RE_THUMB_169)
            .or_else(|| capture(&RE_THUMB))
            .or_else(|| capture(&RE_POSTER));

        let duration_seconds = RE_DURATION
            .captures(html)
            .and_then(|c| c[1].parse::<f64>().ok());

        let title = capture(&RE_PAGE_TITLE).or_else(|| capture(&RE_OG_TITLE));

        ExtractionResult {
            title,
            duration_seconds,
            thumbnail_url,
            stream_url,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ExtractionStrategy for HostScraper {
    fn name(&self) -> &str {
        "host_scraper"
    }

    async fn attempt(&self, url: &str) -> ExtractionResult {
        if !self.handles(url) {
            return ExtractionResult::default();
        }

        let html = match self.client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(%url, "host scraper failed reading body: {e}");
                    return ExtractionResult::default();
                }
            },
            Ok(resp) => {
                warn!(%url, status = %resp.status(), "host scraper got non-success page");
                return ExtractionResult::default();
            }
            Err(e) => {
                warn!(%url, "host scraper fetch failed: {e}");
                return ExtractionResult::default();
            }
        };

        let result = Self::parse_page(&html);
        debug!(
            %url,
            found_stream = result.stream_url.is_some(),
            found_title = result.title.is_some(),
            "host scraper finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PAGE: &str = r#"
        <html><head>
        <meta property="og:title" content="OG Fallback Title" />
        </head><body>
        <h2 class="page-title">Actual Page Title</h2>
        <script>
            html5player.setVideoTitle('Actual Page Title');
            html5player.setVideoUrlLow('https://cdn.example.com/low.mp4');
            html5player.setVideoUrlHigh('https://cdn.example.com/high.mp4');
            html5player.setVideoHLS('https://cdn.example.com/hls-720.m3u8');
            html5player.setVideoDuration(642);
            html5player.setThumbUrl('https://img.example.com/thumb.jpg');
            html5player.setThumbUrl169('https://img.example.com/thumb169.jpg');
        </script>
        </body></html>
    "#;

    #[test]
    fn test_parse_prefers_manifest_stream() {
        let result = HostScraper::parse_page(SAMPLE_PAGE);
        assert_eq!(
            result.stream_url.as_deref(),
            Some("https://cdn.example.com/hls-720.m3u8")
        );
    }

    #[test]
    fn test_parse_quality_fallback_order() {
        let page = r#"
            <script>
                html5player.setVideoUrlLow('https://cdn.example.com/low.mp4');
                html5player.setVideoUrlHigh('https://cdn.example.com/high.mp4');
            </script>
        "#;
        let result = HostScraper::parse_page(page);
        assert_eq!(
            result.stream_url.as_deref(),
            Some("https://cdn.example.com/high.mp4")
        );

        let low_only = r#"<script>html5player.setVideoUrlLow('https://cdn.example.com/low.mp4');</script>"#;
        let result = HostScraper::parse_page(low_only);
        assert_eq!(
            result.stream_url.as_deref(),
            Some("https://cdn.example.com/low.mp4")
        );
    }

    #[test]
    fn test_parse_title_and_duration() {
        let result = HostScraper::parse_page(SAMPLE_PAGE);
        assert_eq!(result.title.as_deref(), Some("Actual Page Title"));
        assert_eq!(result.duration_seconds, Some(642.0));
    }

    #[test]
    fn test_parse_title_falls_back_to_og() {
        let page = r#"<meta property="og:title" content="Only OG" />"#;
        let result = HostScraper::parse_page(page);
        assert_eq!(result.title.as_deref(), Some("Only OG"));
    }

    #[test]
    fn test_parse_thumbnail_preference() {
        let result = HostScraper::parse_page(SAMPLE_PAGE);
        assert_eq!(
            result.thumbnail_url.as_deref(),
            Some("https://img.example.com/thumb169.jpg")
        );

        let poster_only = r#"<script>html5player.setPoster('https://img.example.com/p.jpg');</script>"#;
        let result = HostScraper::parse_page(poster_only);
        assert_eq!(
            result.thumbnail_url.as_deref(),
            Some("https://img.example.com/p.jpg")
        );
    }

    #[test]
    fn test_parse_empty_page() {
        let result = HostScraper::parse_page("<html><body>nothing here</body></html>");
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_attempt_skips_foreign_host() {
        let scraper = HostScraper::new(reqwest::Client::new(), "videohost.example".to_string());
        let result = scraper.attempt("https://other.example/watch/1").await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_attempt_disabled_without_marker() {
        let scraper = HostScraper::new(reqwest::Client::new(), String::new());
        let result = scraper.attempt("https://videohost.example/v/1").await;
        assert!(result.is_empty());
    }

    #[test]
    fn test_handles() {
        let scraper = HostScraper::new(reqwest::Client::new(), "videohost.example".to_string());
        assert!(scraper.handles("https://www.videohost.example/video/123"));
        assert!(!scraper.handles("https://unrelated.example/video/123"));
    }
}
