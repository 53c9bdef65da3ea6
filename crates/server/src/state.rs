use std::sync::Arc;

use streamvault_core::accelerator::Aria2Client;
use streamvault_core::catalog::ItemStore;
use streamvault_core::gateway::StreamGateway;
use streamvault_core::{Config, IngestPipeline, SanitizedConfig, StatusBroadcaster};

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<dyn ItemStore>,
    pipeline: Arc<IngestPipeline>,
    accelerator: Arc<Aria2Client>,
    gateway: Arc<StreamGateway>,
    broadcaster: StatusBroadcaster,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn ItemStore>,
        pipeline: Arc<IngestPipeline>,
        accelerator: Arc<Aria2Client>,
        gateway: Arc<StreamGateway>,
        broadcaster: StatusBroadcaster,
    ) -> Self {
        Self {
            config,
            store,
            pipeline,
            accelerator,
            gateway,
            broadcaster,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn store(&self) -> &dyn ItemStore {
        self.store.as_ref()
    }

    pub fn pipeline(&self) -> &Arc<IngestPipeline> {
        &self.pipeline
    }

    pub fn accelerator(&self) -> &Aria2Client {
        self.accelerator.as_ref()
    }

    pub fn gateway(&self) -> &StreamGateway {
        self.gateway.as_ref()
    }

    pub fn broadcaster(&self) -> &StatusBroadcaster {
        &self.broadcaster
    }
}
