//! Stream gateway.
//!
//! Serves bytes for a catalog item. Local files are confined to the media
//! root; remote URLs are liveness-checked and refreshed on demand before the
//! body is relayed to the consumer.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogItem, ItemStore};
use crate::extractor::FallbackExtractor;
use crate::metrics::{GATEWAY_REFRESHES, GATEWAY_REQUESTS};

/// Browser-like identity presented to upstreams that reject obvious bots.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Directory local playback paths are confined to.
    #[serde(default = "default_media_root")]
    pub media_root: String,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

fn default_media_root() -> String {
    "./media".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    5
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            media_root: default_media_root(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

/// Gateway failures, kept distinct so the boundary can map them to the
/// right response class.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unknown item: {0}")]
    NotFound(i64),

    #[error("item {0} has no playback url")]
    NoStream(i64),

    #[error("path escapes the media root: {0}")]
    Forbidden(String),

    #[error("local file missing: {0}")]
    MissingFile(String),

    #[error("upstream returned status {status}")]
    Upstream { status: u16 },

    #[error("upstream fetch failed: {0}")]
    Fetch(String),
}

/// What the caller should do with the request.
pub enum ServeOutcome {
    /// Serve this local file directly (Range handling is the boundary's job).
    LocalFile { path: PathBuf },
    /// Relay the upstream response: status and passthrough headers come from
    /// it, the body is streamed chunkwise.
    Relay { upstream: reqwest::Response },
}

/// Byte-serving front for catalog items.
pub struct StreamGateway {
    store: Arc<dyn ItemStore>,
    fallback: Arc<dyn FallbackExtractor>,
    client: reqwest::Client,
    config: GatewayConfig,
}

impl StreamGateway {
    pub fn new(
        store: Arc<dyn ItemStore>,
        fallback: Arc<dyn FallbackExtractor>,
        config: GatewayConfig,
    ) -> Self {
        // No global timeout: relays are long-lived streams. Individual
        // probes set their own deadline.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            store,
            fallback,
            client,
            config,
        }
    }

    /// Serve bytes for an item, forwarding any consumer `Range` header.
    pub async fn serve(
        &self,
        item_id: i64,
        range: Option<&str>,
    ) -> Result<ServeOutcome, GatewayError> {
        let item = self
            .store
            .get(item_id)
            .map_err(|_| GatewayError::NotFound(item_id))?;

        if item.playback_url.is_empty() {
            GATEWAY_REQUESTS.with_label_values(&["not_found"]).inc();
            return Err(GatewayError::NoStream(item_id));
        }

        if is_local_reference(&item.playback_url) {
            let path = self.resolve_local(&item.playback_url)?;
            GATEWAY_REQUESTS.with_label_values(&["local"]).inc();
            return Ok(ServeOutcome::LocalFile { path });
        }

        let alive = self.probe_liveness(&item.playback_url).await;
        let url = self.refreshed_url(&item, alive).await;

        let referer = item
            .source_url
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&url)
            .to_string();

        let mut request = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .header(reqwest::header::REFERER, referer);
        if let Some(range) = range {
            request = request.header(reqwest::header::RANGE, range);
        }

        let upstream = request.send().await.map_err(|e| {
            GATEWAY_REQUESTS
                .with_label_values(&["upstream_failure"])
                .inc();
            GatewayError::Fetch(e.to_string())
        })?;

        let status = upstream.status().as_u16();
        if status >= 400 {
            GATEWAY_REQUESTS
                .with_label_values(&["upstream_failure"])
                .inc();
            return Err(GatewayError::Upstream { status });
        }

        GATEWAY_REQUESTS.with_label_values(&["relay"]).inc();
        Ok(ServeOutcome::Relay { upstream })
    }

    /// Bounded HEAD probe; anything at or above 400, or a transport error,
    /// counts as dead.
    async fn probe_liveness(&self, url: &str) -> bool {
        let result = self
            .client
            .head(url)
            .timeout(Duration::from_secs(self.config.probe_timeout_secs))
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await;

        match result {
            Ok(resp) => resp.status().as_u16() < 400,
            Err(e) => {
                debug!(%url, "liveness probe failed: {e}");
                false
            }
        }
    }

    /// Decide which URL to relay. A dead link with a known source gets a
    /// just-in-time re-resolution, persisted before any bytes move; if the
    /// refresh fails the stale URL is still attempted.
    async fn refreshed_url(&self, item: &CatalogItem, alive: bool) -> String {
        if alive {
            return item.playback_url.clone();
        }

        let source = match item.source_url.as_deref().filter(|s| !s.is_empty()) {
            Some(source) => source,
            None => return item.playback_url.clone(),
        };

        info!(item_id = item.id, "stream url dead, attempting refresh");
        match self.fallback.refresh_stream_url(source).await {
            Ok(fresh) => {
                GATEWAY_REFRESHES.with_label_values(&["success"]).inc();
                if let Err(e) = self.store.set_playback_url(item.id, &fresh) {
                    warn!(item_id = item.id, "could not persist refreshed url: {e}");
                }
                fresh
            }
            Err(e) => {
                GATEWAY_REFRESHES.with_label_values(&["failed"]).inc();
                warn!(item_id = item.id, "stream refresh failed, serving stale url: {e}");
                item.playback_url.clone()
            }
        }
    }

    /// Map a local playback reference to a real path under the media root,
    /// rejecting anything that escapes it.
    fn resolve_local(&self, reference: &str) -> Result<PathBuf, GatewayError> {
        let rel = reference
            .trim_start_matches("/static/")
            .trim_start_matches("./")
            .trim_start_matches('/');

        if Path::new(rel)
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(GatewayError::Forbidden(reference.to_string()));
        }

        let root = std::fs::canonicalize(&self.config.media_root)
            .map_err(|e| GatewayError::MissingFile(format!("media root: {e}")))?;
        let candidate = root.join(rel);

        // Canonicalize to catch symlinks pointing outside the root
        let resolved = std::fs::canonicalize(&candidate)
            .map_err(|_| GatewayError::MissingFile(reference.to_string()))?;
        if !resolved.starts_with(&root) {
            return Err(GatewayError::Forbidden(reference.to_string()));
        }
        Ok(resolved)
    }
}

/// Local references: media-root paths, relative paths, anything that is not
/// an http(s) URL.
pub fn is_local_reference(url: &str) -> bool {
    url.starts_with("/static/")
        || url.starts_with("./")
        || !(url.starts_with("http://") || url.starts_with("https://"))
}
