//! Direct-fetch fast path for a file host with a stable API.
//!
//! References shaped like `<base>/file/<id>` never need page scraping: the
//! stream is fetched straight from the file API, the title from the info
//! endpoint, and the thumbnail from the host's own thumbnail endpoint.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ExtractionResult, ExtractionStrategy, SegmentedHostConfig};

static RE_FILE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"/file/([a-zA-Z0-9]+)").unwrap());

#[derive(Debug, Deserialize)]
struct FileInfo {
    #[serde(default)]
    name: Option<String>,
}

/// Client for the segmented-capable file host.
pub struct SegmentedHostClient {
    client: reqwest::Client,
    config: SegmentedHostConfig,
}

impl SegmentedHostClient {
    pub fn new(client: reqwest::Client, config: SegmentedHostConfig) -> Self {
        Self { client, config }
    }

    fn host(&self) -> &str {
        self.config
            .base_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.config.base_url)
            .trim_end_matches('/')
    }

    /// Extract the file id when the reference points at this host.
    pub fn file_id(&self, url: &str) -> Option<String> {
        if !url.contains(self.host()) {
            return None;
        }
        RE_FILE_ID.captures(url).map(|c| c[1].to_string())
    }

    /// Direct stream URL for a file id (skips extraction entirely).
    pub fn direct_fetch_url(&self, file_id: &str) -> String {
        format!("{}/api/file/{file_id}", self.config.base_url.trim_end_matches('/'))
    }

    /// Host-provided thumbnail URL for a file id.
    pub fn thumbnail_url(&self, file_id: &str) -> String {
        format!(
            "{}/api/file/{file_id}/thumbnail",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn fetch_title(&self, file_id: &str) -> Option<String> {
        let info_url = format!(
            "{}/api/file/{file_id}/info",
            self.config.base_url.trim_end_matches('/')
        );
        match self.client.get(&info_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<FileInfo>().await {
                Ok(info) => info.name.filter(|n| !n.is_empty()),
                Err(e) => {
                    warn!(%info_url, "segmented host info parse failed: {e}");
                    None
                }
            },
            Ok(resp) => {
                warn!(%info_url, status = %resp.status(), "segmented host info request rejected");
                None
            }
            Err(e) => {
                warn!(%info_url, "segmented host info request failed: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl ExtractionStrategy for SegmentedHostClient {
    fn name(&self) -> &str {
        "segmented_host"
    }

    async fn attempt(&self, url: &str) -> ExtractionResult {
        let file_id = match self.file_id(url) {
            Some(id) => id,
            None => return ExtractionResult::default(),
        };

        debug!(%url, %file_id, "segmented host fast path");

        ExtractionResult {
            title: self.fetch_title(&file_id).await,
            thumbnail_url: Some(self.thumbnail_url(&file_id)),
            stream_url: Some(self.direct_fetch_url(&file_id)),
            ..Default::default()
        }
    }
}
