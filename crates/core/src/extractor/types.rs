//! Extraction strategy types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Partial metadata resolved from a reference URL. Every field is optional;
/// strategies report only what they found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_seconds: Option<f64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub tags_csv: Option<String>,
    pub thumbnail_url: Option<String>,
    pub stream_url: Option<String>,
    pub subtitle_track_id: Option<String>,
}

impl ExtractionResult {
    /// Merge a lower-priority result into this one: fields already populated
    /// are preserved, gaps are filled. This includes `stream_url` - a later
    /// strategy may supply one only when no earlier strategy did.
    pub fn merge_from(&mut self, other: ExtractionResult) {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }

        fill(&mut self.title, other.title);
        fill(&mut self.description, other.description);
        fill(&mut self.duration_seconds, other.duration_seconds);
        fill(&mut self.width, other.width);
        fill(&mut self.height, other.height);
        fill(&mut self.tags_csv, other.tags_csv);
        fill(&mut self.thumbnail_url, other.thumbnail_url);
        fill(&mut self.stream_url, other.stream_url);
        fill(&mut self.subtitle_track_id, other.subtitle_track_id);
    }

    pub fn is_empty(&self) -> bool {
        *self == ExtractionResult::default()
    }
}

/// Errors from extraction attempts. Strategy-internal failures are degraded
/// to empty results; this type surfaces only from the fallback tool, where
/// the caller decides whether the failure matters.
#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("http request failed: {0}")]
    Http(String),

    #[error("extraction tool failed: {0}")]
    ToolFailed(String),

    #[error("extraction tool timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("failed to parse extractor output: {0}")]
    Parse(String),

    #[error("no usable result for {0}")]
    NoResult(String),
}

/// One pluggable method for resolving a page/URL into playable metadata.
///
/// `attempt` is non-throwing: internal failures degrade to an empty result
/// plus a logged cause, never abort the caller.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn attempt(&self, url: &str) -> ExtractionResult;
}

/// Opaque wide-coverage extraction capability backed by an external tool.
/// Profile-gated by the pipeline because it is slow; also invoked
/// synchronously by the stream gateway to refresh expired URLs.
#[async_trait]
pub trait FallbackExtractor: Send + Sync {
    /// Resolve the richest result the tool can produce. When
    /// `want_subtitles` is set, a caption sidecar named `<item_id>.<lang>.vtt`
    /// is written to the configured subtitle directory as a side effect.
    async fn extract(
        &self,
        url: &str,
        item_id: i64,
        want_subtitles: bool,
    ) -> Result<ExtractionResult, ExtractorError>;

    /// Re-resolve just the direct stream URL for an expired link.
    async fn refresh_stream_url(&self, url: &str) -> Result<String, ExtractorError>;

    /// Where the caption sidecar for an item lands when one is written.
    fn subtitle_path(&self, item_id: i64) -> std::path::PathBuf;
}

/// Extractor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// URL substring identifying the host the host-specific scraper handles.
    /// Empty disables the scraper.
    #[serde(default)]
    pub host_marker: String,
    #[serde(default)]
    pub segmented_host: SegmentedHostConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

/// Direct-fetch host with a stable file API (no page scraping needed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentedHostConfig {
    #[serde(default = "default_segmented_base_url")]
    pub base_url: String,
}

/// External fallback extraction tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_fallback_binary")]
    pub binary_path: String,
    #[serde(default = "default_fallback_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_subtitle_lang")]
    pub subtitle_lang: String,
    #[serde(default = "default_subtitle_dir")]
    pub subtitle_dir: String,
}

fn default_http_timeout_secs() -> u64 {
    15
}

fn default_segmented_base_url() -> String {
    "https://pixeldrain.com".to_string()
}

fn default_fallback_binary() -> String {
    "yt-dlp".to_string()
}

fn default_fallback_timeout_secs() -> u64 {
    120
}

fn default_subtitle_lang() -> String {
    "en".to_string()
}

fn default_subtitle_dir() -> String {
    "./subtitles".to_string()
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout_secs(),
            host_marker: String::new(),
            segmented_host: SegmentedHostConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

impl Default for SegmentedHostConfig {
    fn default() -> Self {
        Self {
            base_url: default_segmented_base_url(),
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            binary_path: default_fallback_binary(),
            timeout_secs: default_fallback_timeout_secs(),
            subtitle_lang: default_subtitle_lang(),
            subtitle_dir: default_subtitle_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_preserves_earlier_fields() {
        let mut first = ExtractionResult {
            title: Some("X".to_string()),
            ..Default::default()
        };
        let second = ExtractionResult {
            title: Some("Y".to_string()),
            stream_url: Some("s1".to_string()),
            ..Default::default()
        };

        first.merge_from(second);

        assert_eq!(first.title.as_deref(), Some("X"));
        assert_eq!(first.stream_url.as_deref(), Some("s1"));
    }

    #[test]
    fn test_merge_stream_url_not_overwritten() {
        let mut first = ExtractionResult {
            stream_url: Some("primary".to_string()),
            ..Default::default()
        };
        first.merge_from(ExtractionResult {
            stream_url: Some("secondary".to_string()),
            duration_seconds: Some(12.0),
            ..Default::default()
        });

        assert_eq!(first.stream_url.as_deref(), Some("primary"));
        assert_eq!(first.duration_seconds, Some(12.0));
    }

    #[test]
    fn test_merge_into_empty_takes_everything() {
        let mut first = ExtractionResult::default();
        first.merge_from(ExtractionResult {
            title: Some("T".to_string()),
            thumbnail_url: Some("u".to_string()),
            ..Default::default()
        });
        assert_eq!(first.title.as_deref(), Some("T"));
        assert_eq!(first.thumbnail_url.as_deref(), Some("u"));
        assert!(!first.is_empty());
    }

    #[test]
    fn test_is_empty() {
        assert!(ExtractionResult::default().is_empty());
    }
}
