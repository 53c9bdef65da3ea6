pub mod accelerator;
pub mod catalog;
pub mod config;
pub mod extractor;
pub mod gateway;
pub mod metrics;
pub mod pipeline;
pub mod probe;
pub mod status;
pub mod testing;

pub use catalog::{CatalogError, CatalogItem, ItemStatus, ItemStore, SqliteStore};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    SanitizedConfig, ServerConfig,
};
pub use pipeline::{IngestPipeline, RunOptions, RunOutcome, SpeedProfile};
pub use status::{StatusBroadcaster, StatusUpdate};
