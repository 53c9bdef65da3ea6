use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server and RPC ports are not 0
/// - Pipeline concurrency is at least 1
/// - Completed-transfer size threshold is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.accelerator.rpc_port == 0 {
        return Err(ConfigError::ValidationError(
            "accelerator.rpc_port cannot be 0".to_string(),
        ));
    }

    if config.pipeline.max_concurrent_runs == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.max_concurrent_runs must be at least 1".to_string(),
        ));
    }

    if config.accelerator.min_complete_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "accelerator.min_complete_bytes cannot be 0".to_string(),
        ));
    }

    if config.accelerator.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "accelerator.poll_interval_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
