//! Download accelerator types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine-side status vocabulary for one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    Active,
    Waiting,
    Paused,
    Complete,
    Error,
    Removed,
}

impl EngineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStatus::Active => "active",
            EngineStatus::Waiting => "waiting",
            EngineStatus::Paused => "paused",
            EngineStatus::Complete => "complete",
            EngineStatus::Error => "error",
            EngineStatus::Removed => "removed",
        }
    }

    /// Parse the engine's own status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(EngineStatus::Active),
            "waiting" => Some(EngineStatus::Waiting),
            "paused" => Some(EngineStatus::Paused),
            "complete" => Some(EngineStatus::Complete),
            "error" => Some(EngineStatus::Error),
            "removed" => Some(EngineStatus::Removed),
            _ => None,
        }
    }
}

/// One file within a transfer, as reported by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFile {
    pub path: String,
    pub length_bytes: u64,
    pub completed_bytes: u64,
}

impl TaskFile {
    /// Bytes actually on disk; falls back to the declared length when the
    /// engine omits per-file completion.
    pub fn effective_bytes(&self) -> u64 {
        if self.completed_bytes > 0 {
            self.completed_bytes
        } else {
            self.length_bytes
        }
    }
}

/// One engine-managed bulk transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    pub transfer_id: String,
    /// Owning catalog item, when known. In-memory correlation only.
    pub catalog_item_id: Option<i64>,
    pub engine_status: EngineStatus,
    pub completed_bytes: u64,
    pub total_bytes: u64,
    pub speed_bps: u64,
    pub files: Vec<TaskFile>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// Engine-wide throughput counters, passed through as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalStats {
    pub download_speed_bps: u64,
    pub upload_speed_bps: u64,
    pub active_count: u64,
    pub waiting_count: u64,
    pub stopped_count: u64,
}

/// Tunables applied to engine startup and transfer submission. Changing
/// them affects future submissions only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_max_connections_per_server")]
    pub max_connections_per_server: u32,
    #[serde(default = "default_split_count")]
    pub split_count: u32,
    #[serde(default = "default_max_concurrent_transfers")]
    pub max_concurrent_transfers: u32,
    #[serde(default = "default_min_split_size")]
    pub min_split_size: String,
}

/// Accelerator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceleratorConfig {
    #[serde(default = "default_engine_binary")]
    pub engine_binary: String,
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,
    #[serde(default)]
    pub rpc_secret: Option<String>,
    #[serde(default = "default_download_dir")]
    pub download_dir: String,
    /// A transfer reported complete with a file below this size is judged to
    /// be an error page, not media.
    #[serde(default = "default_min_complete_bytes")]
    pub min_complete_bytes: u64,
    /// How often the watcher folds engine transfer state into the catalog.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub settings: EngineSettings,
}

impl AcceleratorConfig {
    pub fn rpc_url(&self) -> String {
        format!("http://127.0.0.1:{}/jsonrpc", self.rpc_port)
    }
}

fn default_max_connections_per_server() -> u32 {
    32
}

fn default_split_count() -> u32 {
    32
}

fn default_max_concurrent_transfers() -> u32 {
    20
}

fn default_min_split_size() -> String {
    "1M".to_string()
}

fn default_engine_binary() -> String {
    "aria2c".to_string()
}

fn default_rpc_port() -> u16 {
    6800
}

fn default_download_dir() -> String {
    "./downloads".to_string()
}

fn default_min_complete_bytes() -> u64 {
    1024 * 1024
}

fn default_poll_interval_secs() -> u64 {
    2
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_connections_per_server: default_max_connections_per_server(),
            split_count: default_split_count(),
            max_concurrent_transfers: default_max_concurrent_transfers(),
            min_split_size: default_min_split_size(),
        }
    }
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self {
            engine_binary: default_engine_binary(),
            rpc_port: default_rpc_port(),
            rpc_secret: None,
            download_dir: default_download_dir(),
            min_complete_bytes: default_min_complete_bytes(),
            poll_interval_secs: default_poll_interval_secs(),
            settings: EngineSettings::default(),
        }
    }
}

/// Errors from the accelerator. The engine being down is a structured
/// outcome, never a panic.
#[derive(Debug, Error)]
pub enum AcceleratorError {
    #[error("download engine not available: {0}")]
    EngineUnavailable(String),

    #[error("engine startup failed: {0}")]
    StartupFailed(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected rpc payload: {0}")]
    Payload(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_status_round_trip() {
        for status in [
            EngineStatus::Active,
            EngineStatus::Waiting,
            EngineStatus::Paused,
            EngineStatus::Complete,
            EngineStatus::Error,
            EngineStatus::Removed,
        ] {
            assert_eq!(EngineStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EngineStatus::parse("downloading"), None);
    }

    #[test]
    fn test_effective_bytes_prefers_completed() {
        let file = TaskFile {
            path: "/dl/1.mp4".to_string(),
            length_bytes: 100,
            completed_bytes: 40,
        };
        assert_eq!(file.effective_bytes(), 40);

        let unreported = TaskFile {
            path: "/dl/2.mp4".to_string(),
            length_bytes: 100,
            completed_bytes: 0,
        };
        assert_eq!(unreported.effective_bytes(), 100);
    }

    #[test]
    fn test_default_settings_match_deployment() {
        let settings = EngineSettings::default();
        assert_eq!(settings.max_connections_per_server, 32);
        assert_eq!(settings.split_count, 32);
        assert_eq!(settings.max_concurrent_transfers, 20);
        assert_eq!(settings.min_split_size, "1M");
    }

    #[test]
    fn test_rpc_url() {
        let config = AcceleratorConfig::default();
        assert_eq!(config.rpc_url(), "http://127.0.0.1:6800/jsonrpc");
    }
}
