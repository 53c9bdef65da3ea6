//! Probe toolchain types.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Technical metadata read back from the toolchain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration_seconds: Option<f64>,
}

/// Errors from toolchain invocations. Callers treat these as advisory: a
/// failed probe or preview never fails the owning item.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{tool} exited with failure: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("{tool} timed out after {seconds}s")]
    Timeout { tool: String, seconds: u64 },

    #[error("failed to parse {tool} output: {message}")]
    ParseError { tool: String, message: String },

    #[error("io error: {0}")]
    Io(String),

    #[error("toolchain not available: {0}")]
    NotAvailable(String),
}

/// Media inspection and preview generation seam.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Measure stream dimensions and duration for a local path or remote URL.
    async fn probe(&self, locator: &str) -> Result<ProbeResult, ProbeError>;

    /// Cut a single thumbnail frame to `output`. `duration_hint` picks the
    /// seek strategy (fixed-offset seek for long clips, frame-selection
    /// filter for very short ones).
    async fn generate_thumbnail(
        &self,
        locator: &str,
        duration_hint: Option<f64>,
        output: &Path,
    ) -> Result<(), ProbeError>;

    /// Cut a short looping preview clip to `output`.
    async fn generate_preview(
        &self,
        locator: &str,
        duration_seconds: f64,
        output: &Path,
    ) -> Result<(), ProbeError>;
}

/// Toolchain configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_thumbnail_timeout_secs")]
    pub thumbnail_timeout_secs: u64,
    #[serde(default = "default_preview_timeout_secs")]
    pub preview_timeout_secs: u64,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_thumbnail_timeout_secs() -> u64 {
    60
}

fn default_preview_timeout_secs() -> u64 {
    45
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            probe_timeout_secs: default_probe_timeout_secs(),
            thumbnail_timeout_secs: default_thumbnail_timeout_secs(),
            preview_timeout_secs: default_preview_timeout_secs(),
        }
    }
}
