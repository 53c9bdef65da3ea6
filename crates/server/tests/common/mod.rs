//! Common test utilities for in-process API testing.
//!
//! Builds the full axum application with mock extraction sources, a mock
//! probe and a throwaway SQLite catalog, so requests exercise the real
//! handlers without external infrastructure. The download engine RPC port
//! points at a closed loopback port, so accelerator calls fail fast instead
//! of launching anything.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use streamvault_core::{
    accelerator::{AcceleratorConfig, Aria2Client},
    catalog::{ItemStore, SqliteStore},
    extractor::{ExtractionStrategy, SegmentedHostClient, SegmentedHostConfig},
    gateway::{GatewayConfig, StreamGateway},
    pipeline::{IngestPipeline, PipelineConfig},
    testing::{MockFallback, MockProbe, MockStrategy},
    Config, DatabaseConfig, StatusBroadcaster,
};

use streamvault_server::api::create_router;
use streamvault_server::state::AppState;

/// Re-export fixtures for test convenience
pub use streamvault_core::testing::fixtures;

/// In-process server with controllable mocks.
pub struct TestFixture {
    pub router: Router,
    pub store: Arc<SqliteStore>,
    pub host: Arc<MockStrategy>,
    pub generic: Arc<MockStrategy>,
    pub fallback: Arc<MockFallback>,
    pub probe: Arc<MockProbe>,
    pub broadcaster: StatusBroadcaster,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_config_mut(|_| {}).await
    }

    /// Build a fixture, letting the caller adjust the config first.
    pub async fn with_config_mut(adjust: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let media_root = temp_dir.path().join("media");
        std::fs::create_dir_all(&media_root).expect("Failed to create media root");

        let store = Arc::new(SqliteStore::new(&db_path).expect("Failed to open catalog"));
        let host = Arc::new(MockStrategy::new("host"));
        let generic = Arc::new(MockStrategy::new("generic"));
        let fallback = Arc::new(MockFallback::with_subtitle_dir(temp_dir.path()));
        let probe = Arc::new(MockProbe::new());
        let broadcaster = StatusBroadcaster::default();

        let mut config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            pipeline: PipelineConfig {
                preview_dir: temp_dir.path().join("previews").display().to_string(),
                ..Default::default()
            },
            accelerator: AcceleratorConfig {
                // Closed loopback port: RPC calls are refused immediately.
                rpc_port: 1,
                download_dir: temp_dir.path().join("downloads").display().to_string(),
                ..Default::default()
            },
            gateway: GatewayConfig {
                media_root: media_root.display().to_string(),
                probe_timeout_secs: 1,
            },
            ..Default::default()
        };
        adjust(&mut config);

        // Segmented-host lookups fail fast against a closed port too.
        let segmented = Arc::new(SegmentedHostClient::new(
            reqwest::Client::new(),
            SegmentedHostConfig {
                base_url: "http://127.0.0.1:1".to_string(),
            },
        ));

        let pipeline = Arc::new(IngestPipeline::new(
            store.clone() as Arc<dyn ItemStore>,
            host.clone() as Arc<dyn ExtractionStrategy>,
            generic.clone() as Arc<dyn ExtractionStrategy>,
            segmented,
            fallback.clone(),
            probe.clone(),
            broadcaster.clone(),
            reqwest::Client::new(),
            config.pipeline.clone(),
        ));

        let accelerator = Arc::new(Aria2Client::new(config.accelerator.clone()));

        let gateway = Arc::new(StreamGateway::new(
            store.clone() as Arc<dyn ItemStore>,
            fallback.clone(),
            config.gateway.clone(),
        ));

        let state = Arc::new(AppState::new(
            config,
            store.clone() as Arc<dyn ItemStore>,
            pipeline,
            accelerator,
            gateway,
            broadcaster.clone(),
        ));

        let router = create_router(state);

        Self {
            router,
            store,
            host,
            generic,
            fallback,
            probe,
            broadcaster,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Fetch a path and return the raw body as text (for /metrics).
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    /// Poll the catalog until the item reaches a terminal status.
    pub async fn wait_for_terminal_status(&self, id: i64) -> streamvault_core::CatalogItem {
        for _ in 0..100 {
            let item = self.store.get(id).expect("item disappeared");
            match item.status {
                streamvault_core::ItemStatus::Ready | streamvault_core::ItemStatus::Error => {
                    return item
                }
                _ => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
        panic!("item {id} never reached a terminal status");
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        let body = match body {
            Some(value) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
