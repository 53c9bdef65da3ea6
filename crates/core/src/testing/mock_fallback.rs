//! Mock fallback extractor for testing.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::extractor::{ExtractionResult, ExtractorError, FallbackExtractor};

/// One recorded extraction call.
#[derive(Debug, Clone)]
pub struct RecordedExtraction {
    pub url: String,
    pub item_id: i64,
    pub want_subtitles: bool,
}

/// Mock implementation of the [`FallbackExtractor`] trait.
///
/// Provides controllable behavior for testing:
/// - Return a configurable extraction result or fail on demand
/// - Serve a configurable refreshed stream URL
/// - Track extraction and refresh calls for assertions
pub struct MockFallback {
    result: Arc<RwLock<ExtractionResult>>,
    fresh_url: Arc<RwLock<Option<String>>>,
    /// If set, the next extract call fails with this error.
    next_error: Arc<RwLock<Option<ExtractorError>>>,
    extractions: Arc<RwLock<Vec<RecordedExtraction>>>,
    refreshes: Arc<RwLock<Vec<String>>>,
    subtitle_dir: PathBuf,
}

impl Default for MockFallback {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFallback {
    pub fn new() -> Self {
        Self {
            result: Arc::new(RwLock::new(ExtractionResult::default())),
            fresh_url: Arc::new(RwLock::new(None)),
            next_error: Arc::new(RwLock::new(None)),
            extractions: Arc::new(RwLock::new(Vec::new())),
            refreshes: Arc::new(RwLock::new(Vec::new())),
            subtitle_dir: std::env::temp_dir(),
        }
    }

    /// Create a mock whose caption sidecars live under the given directory.
    pub fn with_subtitle_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            subtitle_dir: dir.into(),
            ..Self::new()
        }
    }

    /// Set the result returned by subsequent extractions.
    pub async fn set_result(&self, result: ExtractionResult) {
        *self.result.write().await = result;
    }

    /// Set the URL returned by subsequent refreshes.
    pub async fn set_fresh_url(&self, url: &str) {
        *self.fresh_url.write().await = Some(url.to_string());
    }

    /// Configure the next extraction to fail with the given error.
    pub async fn set_next_error(&self, error: ExtractorError) {
        *self.next_error.write().await = Some(error);
    }

    /// Get recorded extraction calls.
    pub async fn recorded_extractions(&self) -> Vec<RecordedExtraction> {
        self.extractions.read().await.clone()
    }

    /// Get the number of extraction calls performed.
    pub async fn extraction_count(&self) -> usize {
        self.extractions.read().await.len()
    }

    /// Get recorded refresh URLs.
    pub async fn recorded_refreshes(&self) -> Vec<String> {
        self.refreshes.read().await.clone()
    }
}

#[async_trait]
impl FallbackExtractor for MockFallback {
    async fn extract(
        &self,
        url: &str,
        item_id: i64,
        want_subtitles: bool,
    ) -> Result<ExtractionResult, ExtractorError> {
        self.extractions.write().await.push(RecordedExtraction {
            url: url.to_string(),
            item_id,
            want_subtitles,
        });

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        Ok(self.result.read().await.clone())
    }

    async fn refresh_stream_url(&self, url: &str) -> Result<String, ExtractorError> {
        self.refreshes.write().await.push(url.to_string());
        self.fresh_url
            .read()
            .await
            .clone()
            .ok_or_else(|| ExtractorError::NoResult(url.to_string()))
    }

    fn subtitle_path(&self, item_id: i64) -> PathBuf {
        self.subtitle_dir.join(format!("{item_id}.en.vtt"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_extractions() {
        let fallback = MockFallback::new();
        fallback.extract("https://a.example/v", 7, true).await.unwrap();

        let calls = fallback.recorded_extractions().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].item_id, 7);
        assert!(calls[0].want_subtitles);
    }

    #[tokio::test]
    async fn test_error_injection_consumed() {
        let fallback = MockFallback::new();
        fallback
            .set_next_error(ExtractorError::ToolFailed("boom".to_string()))
            .await;

        assert!(fallback.extract("u", 1, false).await.is_err());
        assert!(fallback.extract("u", 1, false).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_without_configured_url_fails() {
        let fallback = MockFallback::new();
        assert!(fallback.refresh_stream_url("u").await.is_err());

        fallback.set_fresh_url("https://cdn.example/fresh.m3u8").await;
        assert_eq!(
            fallback.refresh_stream_url("u").await.unwrap(),
            "https://cdn.example/fresh.m3u8"
        );
    }
}
