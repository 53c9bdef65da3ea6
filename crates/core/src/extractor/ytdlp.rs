//! Wide-coverage fallback extraction via an external yt-dlp style binary.
//!
//! The tool is treated as an opaque capability: one JSON dump per reference,
//! optionally a caption sidecar, and a bare URL re-resolution used by the
//! stream gateway. All invocations are timeboxed.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{ExtractionResult, ExtractorError, FallbackConfig, FallbackExtractor};

#[derive(Debug, Deserialize)]
struct DumpedInfo {
    title: Option<String>,
    description: Option<String>,
    duration: Option<f64>,
    width: Option<i64>,
    height: Option<i64>,
    #[serde(default)]
    tags: Vec<String>,
    thumbnail: Option<String>,
    url: Option<String>,
}

/// External-tool implementation of [`FallbackExtractor`].
pub struct YtDlpExtractor {
    config: FallbackConfig,
}

impl YtDlpExtractor {
    pub fn new(config: FallbackConfig) -> Self {
        Self { config }
    }

    fn subtitle_output_template(&self, item_id: i64) -> String {
        format!("{}/{item_id}", self.config.subtitle_dir.trim_end_matches('/'))
    }

    async fn run(&self, args: &[String]) -> Result<String, ExtractorError> {
        debug!(binary = %self.config.binary_path, ?args, "invoking fallback extractor");

        let child = Command::new(&self.config.binary_path)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExtractorError::ToolFailed(e.to_string()))?;

        let output = match timeout(
            Duration::from_secs(self.config.timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ExtractorError::ToolFailed(e.to_string())),
            Err(_) => {
                return Err(ExtractorError::Timeout {
                    seconds: self.config.timeout_secs,
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractorError::ToolFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn parse_dump(stdout: &str) -> Result<ExtractionResult, ExtractorError> {
        let info: DumpedInfo =
            serde_json::from_str(stdout).map_err(|e| ExtractorError::Parse(e.to_string()))?;

        let tags_csv = if info.tags.is_empty() {
            None
        } else {
            Some(info.tags.join(","))
        };

        Ok(ExtractionResult {
            title: info.title.filter(|t| !t.is_empty()),
            description: info.description.filter(|d| !d.is_empty()),
            duration_seconds: info.duration,
            width: info.width,
            height: info.height,
            tags_csv,
            thumbnail_url: info.thumbnail,
            stream_url: info.url.filter(|u| !u.is_empty()),
            subtitle_track_id: None,
        })
    }

    /// Best-effort caption download; a missing or failed track is not an
    /// extraction failure.
    async fn fetch_subtitles(&self, url: &str, item_id: i64) {
        if let Err(e) = tokio::fs::create_dir_all(&self.config.subtitle_dir).await {
            warn!("could not create subtitle dir: {e}");
            return;
        }

        let args = vec![
            "--skip-download".to_string(),
            "--write-subs".to_string(),
            "--sub-langs".to_string(),
            self.config.subtitle_lang.clone(),
            "--sub-format".to_string(),
            "vtt".to_string(),
            "--no-warnings".to_string(),
            "-o".to_string(),
            self.subtitle_output_template(item_id),
            url.to_string(),
        ];

        if let Err(e) = self.run(&args).await {
            debug!(%url, item_id, "subtitle fetch skipped: {e}");
        }
    }
}

#[async_trait]
impl FallbackExtractor for YtDlpExtractor {
    async fn extract(
        &self,
        url: &str,
        item_id: i64,
        want_subtitles: bool,
    ) -> Result<ExtractionResult, ExtractorError> {
        let args = vec![
            "-J".to_string(),
            "--no-warnings".to_string(),
            "-f".to_string(),
            "best".to_string(),
            url.to_string(),
        ];

        let stdout = self.run(&args).await?;
        let mut result = Self::parse_dump(&stdout)?;

        if result.is_empty() {
            return Err(ExtractorError::NoResult(url.to_string()));
        }

        if want_subtitles {
            self.fetch_subtitles(url, item_id).await;
            if self.subtitle_path(item_id).exists() {
                result.subtitle_track_id = Some(self.config.subtitle_lang.clone());
            }
        }

        Ok(result)
    }

    fn subtitle_path(&self, item_id: i64) -> PathBuf {
        PathBuf::from(format!(
            "{}/{item_id}.{}.vtt",
            self.config.subtitle_dir.trim_end_matches('/'),
            self.config.subtitle_lang
        ))
    }

    async fn refresh_stream_url(&self, url: &str) -> Result<String, ExtractorError> {
        let args = vec![
            "-g".to_string(),
            "-f".to_string(),
            "best".to_string(),
            "--no-warnings".to_string(),
            url.to_string(),
        ];

        let stdout = self.run(&args).await?;
        let fresh = stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| ExtractorError::NoResult(url.to_string()))?;

        Ok(fresh.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dump_full() {
        let json = r#"{
            "title": "A Video",
            "description": "About things",
            "duration": 321.5,
            "width": 1920,
            "height": 1080,
            "tags": ["one", "two"],
            "thumbnail": "https://img.example.com/t.jpg",
            "url": "https://cdn.example.com/direct.mp4"
        }"#;
        let result = YtDlpExtractor::parse_dump(json).unwrap();
        assert_eq!(result.title.as_deref(), Some("A Video"));
        assert_eq!(result.duration_seconds, Some(321.5));
        assert_eq!(result.tags_csv.as_deref(), Some("one,two"));
        assert_eq!(
            result.stream_url.as_deref(),
            Some("https://cdn.example.com/direct.mp4")
        );
    }

    #[test]
    fn test_parse_dump_sparse() {
        let json = r#"{"title": "Only Title"}"#;
        let result = YtDlpExtractor::parse_dump(json).unwrap();
        assert_eq!(result.title.as_deref(), Some("Only Title"));
        assert!(result.stream_url.is_none());
        assert!(result.tags_csv.is_none());
    }

    #[test]
    fn test_parse_dump_invalid() {
        assert!(YtDlpExtractor::parse_dump("ERROR: unsupported url").is_err());
    }

    #[test]
    fn test_subtitle_path_naming() {
        let extractor = YtDlpExtractor::new(FallbackConfig {
            subtitle_dir: "/data/subs/".to_string(),
            ..Default::default()
        });
        assert_eq!(
            extractor.subtitle_path(42),
            PathBuf::from("/data/subs/42.en.vtt")
        );
    }

    #[tokio::test]
    async fn test_missing_binary_degrades_to_error() {
        let extractor = YtDlpExtractor::new(FallbackConfig {
            binary_path: "/nonexistent/definitely-not-a-binary".to_string(),
            ..Default::default()
        });
        let result = extractor.extract("https://a.example/v", 1, false).await;
        assert!(matches!(result, Err(ExtractorError::ToolFailed(_))));

        let refresh = extractor.refresh_stream_url("https://a.example/v").await;
        assert!(refresh.is_err());
    }
}
