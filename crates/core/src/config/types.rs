use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::accelerator::AcceleratorConfig;
use crate::extractor::ExtractorConfig;
use crate::gateway::GatewayConfig;
use crate::pipeline::PipelineConfig;
use crate::probe::ProbeConfig;

/// Root configuration. Every section has workable defaults; an empty file is
/// a valid configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub accelerator: AcceleratorConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    // Serde defaults never run user input through this.
    "0.0.0.0".parse().expect("valid default host")
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("streamvault.db")
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub pipeline: PipelineConfig,
    pub extractor: ExtractorConfig,
    pub probe: ProbeConfig,
    pub accelerator: SanitizedAcceleratorConfig,
    pub gateway: GatewayConfig,
}

/// Sanitized accelerator config (RPC secret hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAcceleratorConfig {
    pub engine_binary: String,
    pub rpc_port: u16,
    pub rpc_secret_configured: bool,
    pub download_dir: String,
    pub min_complete_bytes: u64,
    pub poll_interval_secs: u64,
    pub settings: crate::accelerator::EngineSettings,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            pipeline: config.pipeline.clone(),
            extractor: config.extractor.clone(),
            probe: config.probe.clone(),
            accelerator: SanitizedAcceleratorConfig {
                engine_binary: config.accelerator.engine_binary.clone(),
                rpc_port: config.accelerator.rpc_port,
                rpc_secret_configured: config
                    .accelerator
                    .rpc_secret
                    .as_deref()
                    .is_some_and(|s| !s.is_empty()),
                download_dir: config.accelerator.download_dir.clone(),
                min_complete_bytes: config.accelerator.min_complete_bytes,
                poll_interval_secs: config.accelerator.poll_interval_secs,
                settings: config.accelerator.settings.clone(),
            },
            gateway: config.gateway.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "streamvault.db");
        assert_eq!(config.accelerator.rpc_port, 6800);
    }

    #[test]
    fn test_deserialize_custom_sections() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[database]
path = "/data/sv.sqlite"

[pipeline]
max_concurrent_runs = 4

[accelerator]
rpc_secret = "hunter2"
min_complete_bytes = 4096
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.database.path.to_str().unwrap(), "/data/sv.sqlite");
        assert_eq!(config.pipeline.max_concurrent_runs, 4);
        assert_eq!(config.accelerator.rpc_secret.as_deref(), Some("hunter2"));
        assert_eq!(config.accelerator.min_complete_bytes, 4096);
    }

    #[test]
    fn test_sanitized_config_hides_secret() {
        let mut config = Config::default();
        config.accelerator.rpc_secret = Some("secret-token".to_string());

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.accelerator.rpc_secret_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret-token"));
    }

    #[test]
    fn test_sanitized_config_without_secret() {
        let config = Config::default();
        let sanitized = SanitizedConfig::from(&config);
        assert!(!sanitized.accelerator.rpc_secret_configured);
    }
}
