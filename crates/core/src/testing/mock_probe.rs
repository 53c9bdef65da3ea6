//! Mock media probe for testing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::probe::{MediaProbe, ProbeError, ProbeResult};

/// Mock implementation of the [`MediaProbe`] trait.
///
/// Provides controllable behavior for testing:
/// - Return a configurable probe result or fail on demand
/// - Write placeholder thumbnail/preview files so path checks pass
/// - Track generated outputs for assertions
pub struct MockProbe {
    result: Arc<RwLock<ProbeResult>>,
    /// If set, the next probe call fails with this error.
    next_error: Arc<RwLock<Option<ProbeError>>>,
    probes: Arc<RwLock<Vec<String>>>,
    thumbnails: Arc<RwLock<Vec<PathBuf>>>,
    previews: Arc<RwLock<Vec<PathBuf>>>,
}

impl Default for MockProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProbe {
    pub fn new() -> Self {
        Self {
            result: Arc::new(RwLock::new(ProbeResult {
                width: Some(1920),
                height: Some(1080),
                duration_seconds: Some(60.0),
            })),
            next_error: Arc::new(RwLock::new(None)),
            probes: Arc::new(RwLock::new(Vec::new())),
            thumbnails: Arc::new(RwLock::new(Vec::new())),
            previews: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Set the result returned by subsequent probes.
    pub async fn set_result(&self, result: ProbeResult) {
        *self.result.write().await = result;
    }

    /// Configure the next probe to fail with the given error.
    pub async fn set_next_error(&self, error: ProbeError) {
        *self.next_error.write().await = Some(error);
    }

    /// Get recorded probe locators.
    pub async fn recorded_probes(&self) -> Vec<String> {
        self.probes.read().await.clone()
    }

    /// Get recorded thumbnail output paths.
    pub async fn recorded_thumbnails(&self) -> Vec<PathBuf> {
        self.thumbnails.read().await.clone()
    }

    /// Get recorded preview output paths.
    pub async fn recorded_previews(&self) -> Vec<PathBuf> {
        self.previews.read().await.clone()
    }
}

#[async_trait]
impl MediaProbe for MockProbe {
    async fn probe(&self, locator: &str) -> Result<ProbeResult, ProbeError> {
        self.probes.write().await.push(locator.to_string());
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        Ok(self.result.read().await.clone())
    }

    async fn generate_thumbnail(
        &self,
        _locator: &str,
        _duration_hint: Option<f64>,
        output: &Path,
    ) -> Result<(), ProbeError> {
        tokio::fs::write(output, b"jpeg")
            .await
            .map_err(|e| ProbeError::Io(e.to_string()))?;
        self.thumbnails.write().await.push(output.to_path_buf());
        Ok(())
    }

    async fn generate_preview(
        &self,
        _locator: &str,
        _duration_seconds: f64,
        output: &Path,
    ) -> Result<(), ProbeError> {
        tokio::fs::write(output, b"gif")
            .await
            .map_err(|e| ProbeError::Io(e.to_string()))?;
        self.previews.write().await.push(output.to_path_buf());
        Ok(())
    }
}
