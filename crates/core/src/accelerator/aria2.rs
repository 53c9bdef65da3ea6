//! aria2-compatible JSON-RPC client with lazy engine startup.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{
    AcceleratorConfig, AcceleratorError, DownloadTask, EngineSettings, EngineStatus, GlobalStats,
    TaskFile,
};
use crate::metrics::{TRANSFERS_RECLASSIFIED, TRANSFERS_SUBMITTED};

const RPC_TIMEOUT: Duration = Duration::from_secs(10);
const STARTUP_PROBE_ATTEMPTS: u32 = 10;
const STARTUP_PROBE_INTERVAL: Duration = Duration::from_millis(300);

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

// aria2 reports every numeric field as a decimal string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineTaskStatus {
    gid: String,
    status: String,
    #[serde(default)]
    total_length: Option<String>,
    #[serde(default)]
    completed_length: Option<String>,
    #[serde(default)]
    download_speed: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    files: Vec<EngineTaskFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineTaskFile {
    path: String,
    #[serde(default)]
    length: Option<String>,
    #[serde(default)]
    completed_length: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineGlobalStat {
    #[serde(default)]
    download_speed: Option<String>,
    #[serde(default)]
    upload_speed: Option<String>,
    #[serde(default)]
    num_active: Option<String>,
    #[serde(default)]
    num_waiting: Option<String>,
    #[serde(default)]
    num_stopped: Option<String>,
}

fn parse_u64(value: &Option<String>) -> u64 {
    value
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0)
}

impl EngineTaskStatus {
    fn into_task(self, catalog_item_id: Option<i64>) -> DownloadTask {
        let files = self
            .files
            .into_iter()
            .map(|f| TaskFile {
                length_bytes: parse_u64(&f.length),
                completed_bytes: parse_u64(&f.completed_length),
                path: f.path,
            })
            .collect();

        DownloadTask {
            transfer_id: self.gid,
            catalog_item_id,
            engine_status: EngineStatus::parse(&self.status).unwrap_or(EngineStatus::Error),
            completed_bytes: parse_u64(&self.completed_length),
            total_bytes: parse_u64(&self.total_length),
            speed_bps: parse_u64(&self.download_speed),
            files,
            error_code: self.error_code,
            error_message: self.error_message,
        }
    }
}

/// Client for a singleton external segmented-download engine.
///
/// The engine process is started lazily on the first submission that finds
/// it dead; concurrent submissions serialize the start-then-probe sequence
/// so only one engine is ever launched.
pub struct Aria2Client {
    client: reqwest::Client,
    config: AcceleratorConfig,
    settings: RwLock<EngineSettings>,
    /// transfer id -> owning catalog item. Volatile; rebuilt empty on
    /// restart, re-derived from tagged output filenames where possible.
    transfer_items: RwLock<HashMap<String, i64>>,
    startup_lock: Mutex<()>,
    engine_child: Mutex<Option<Child>>,
    request_seq: AtomicU64,
}

impl Aria2Client {
    pub fn new(config: AcceleratorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .unwrap_or_default();
        let settings = config.settings.clone();

        Self {
            client,
            config,
            settings: RwLock::new(settings),
            transfer_items: RwLock::new(HashMap::new()),
            startup_lock: Mutex::new(()),
            engine_child: Mutex::new(None),
            request_seq: AtomicU64::new(1),
        }
    }

    /// Build one JSON-RPC request envelope. The authentication token, when
    /// configured, is always the first params element.
    fn build_request(&self, id: u64, method: &str, params: Vec<Value>) -> Value {
        let mut full_params = Vec::with_capacity(params.len() + 1);
        if let Some(secret) = &self.config.rpc_secret {
            full_params.push(json!(format!("token:{secret}")));
        }
        full_params.extend(params);

        json!({
            "jsonrpc": "2.0",
            "id": id.to_string(),
            "method": method,
            "params": full_params,
        })
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, AcceleratorError> {
        let id = self.request_seq.fetch_add(1, Ordering::Relaxed);
        let body = self.build_request(id, method, params);

        let response = self
            .client
            .post(self.config.rpc_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AcceleratorError::EngineUnavailable(e.to_string())
                } else if e.is_timeout() {
                    AcceleratorError::Http("rpc request timed out".to_string())
                } else {
                    AcceleratorError::Http(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(AcceleratorError::Http(format!(
                "rpc endpoint returned {}",
                response.status()
            )));
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|e| AcceleratorError::Payload(e.to_string()))?;

        if let Some(err) = parsed.error {
            warn!(method, code = err.code, "engine rpc error: {}", err.message);
            return Err(AcceleratorError::Rpc(format!(
                "{} (code {})",
                err.message, err.code
            )));
        }

        parsed
            .result
            .ok_or_else(|| AcceleratorError::Payload("response carried no result".to_string()))
    }

    /// Liveness probe against the engine's version endpoint.
    pub async fn is_alive(&self) -> bool {
        self.call("aria2.getVersion", vec![]).await.is_ok()
    }

    /// Make sure a live engine exists, launching one if needed. Start and
    /// re-probe are serialized so concurrent submissions cannot race a
    /// second engine into existence.
    async fn ensure_engine(&self) -> Result<(), AcceleratorError> {
        if self.is_alive().await {
            return Ok(());
        }

        let _guard = self.startup_lock.lock().await;
        if self.is_alive().await {
            return Ok(());
        }
        self.start_engine().await
    }

    async fn start_engine(&self) -> Result<(), AcceleratorError> {
        let settings = self.settings.read().await.clone();

        tokio::fs::create_dir_all(&self.config.download_dir)
            .await
            .map_err(|e| AcceleratorError::StartupFailed(format!("download dir: {e}")))?;

        let mut cmd = Command::new(&self.config.engine_binary);
        cmd.arg("--enable-rpc")
            .arg(format!("--rpc-listen-port={}", self.config.rpc_port))
            .arg(format!("--dir={}", self.config.download_dir))
            .arg(format!(
                "--max-connection-per-server={}",
                settings.max_connections_per_server
            ))
            .arg(format!("--split={}", settings.split_count))
            .arg(format!("--min-split-size={}", settings.min_split_size))
            .arg(format!(
                "--max-concurrent-downloads={}",
                settings.max_concurrent_transfers
            ))
            .arg("--continue=true")
            .arg("--auto-file-renaming=false")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());

        if let Some(secret) = &self.config.rpc_secret {
            cmd.arg(format!("--rpc-secret={secret}"));
        }

        info!(binary = %self.config.engine_binary, port = self.config.rpc_port, "starting download engine");
        let child = cmd
            .spawn()
            .map_err(|e| AcceleratorError::StartupFailed(e.to_string()))?;
        *self.engine_child.lock().await = Some(child);

        for _ in 0..STARTUP_PROBE_ATTEMPTS {
            tokio::time::sleep(STARTUP_PROBE_INTERVAL).await;
            if self.is_alive().await {
                info!("download engine is up");
                return Ok(());
            }
        }

        Err(AcceleratorError::StartupFailed(
            "engine never answered the liveness probe".to_string(),
        ))
    }

    /// Submit a transfer. Returns the engine-issued transfer id.
    pub async fn submit(
        &self,
        url: &str,
        catalog_item_id: i64,
        filename: Option<String>,
    ) -> Result<String, AcceleratorError> {
        self.ensure_engine().await?;

        let settings = self.settings.read().await.clone();
        // Tag the output with the item id so ownership survives a restart.
        let out_name = filename.unwrap_or_else(|| format!("{catalog_item_id}.mp4"));

        let options = json!({
            "dir": self.config.download_dir,
            "max-connection-per-server": settings.max_connections_per_server.to_string(),
            "split": settings.split_count.to_string(),
            "min-split-size": settings.min_split_size,
            "out": out_name,
        });

        let result = self
            .call("aria2.addUri", vec![json!([url]), options])
            .await?;
        let gid = result
            .as_str()
            .ok_or_else(|| AcceleratorError::Payload("addUri returned a non-string id".to_string()))?
            .to_string();

        self.transfer_items
            .write()
            .await
            .insert(gid.clone(), catalog_item_id);
        TRANSFERS_SUBMITTED.inc();
        info!(%url, %gid, catalog_item_id, "transfer submitted");

        Ok(gid)
    }

    async fn owner_of(&self, gid: &str, files: &[TaskFile]) -> Option<i64> {
        if let Some(id) = self.transfer_items.read().await.get(gid) {
            return Some(*id);
        }
        files.first().and_then(|f| item_id_from_path(&f.path))
    }

    /// Apply the too-small-to-be-real rule to a completed transfer.
    fn validate_task(&self, task: &mut DownloadTask) {
        if task.engine_status != EngineStatus::Complete {
            return;
        }

        let threshold = self.config.min_complete_bytes;
        let undersized: Vec<String> = task
            .files
            .iter()
            .filter(|f| f.effective_bytes() < threshold)
            .map(|f| f.path.clone())
            .collect();

        if undersized.is_empty() {
            return;
        }

        warn!(
            gid = %task.transfer_id,
            threshold,
            "completed transfer has undersized files, reclassifying as error"
        );
        task.engine_status = EngineStatus::Error;
        task.error_code = Some("FILE_TOO_SMALL".to_string());
        task.error_message = Some(format!(
            "download finished below the {threshold}-byte floor; the server most likely returned an error page"
        ));
        TRANSFERS_RECLASSIFIED.inc();

        for path in undersized {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(%path, "removed undersized download"),
                Err(e) => warn!(%path, "could not remove undersized download: {e}"),
            }
        }
    }

    async fn to_validated_task(&self, status: EngineTaskStatus) -> DownloadTask {
        let gid = status.gid.clone();
        let mut task = status.into_task(None);
        task.catalog_item_id = self.owner_of(&gid, &task.files).await;
        self.validate_task(&mut task);
        task
    }

    /// Fetch the current state of one transfer.
    pub async fn status(&self, gid: &str) -> Result<DownloadTask, AcceleratorError> {
        let result = self.call("aria2.tellStatus", vec![json!(gid)]).await?;
        let status: EngineTaskStatus =
            serde_json::from_value(result).map_err(|e| AcceleratorError::Payload(e.to_string()))?;
        Ok(self.to_validated_task(status).await)
    }

    /// List transfers the engine is actively working on.
    pub async fn list_active(&self) -> Result<Vec<DownloadTask>, AcceleratorError> {
        let result = self.call("aria2.tellActive", vec![]).await?;
        self.parse_task_list(result).await
    }

    /// List recently finished (or failed/removed) transfers.
    pub async fn list_finished(&self, limit: u32) -> Result<Vec<DownloadTask>, AcceleratorError> {
        let result = self
            .call("aria2.tellStopped", vec![json!(0), json!(limit)])
            .await?;
        self.parse_task_list(result).await
    }

    async fn parse_task_list(&self, result: Value) -> Result<Vec<DownloadTask>, AcceleratorError> {
        let statuses: Vec<EngineTaskStatus> =
            serde_json::from_value(result).map_err(|e| AcceleratorError::Payload(e.to_string()))?;

        let mut tasks = Vec::with_capacity(statuses.len());
        for status in statuses {
            tasks.push(self.to_validated_task(status).await);
        }
        Ok(tasks)
    }

    /// Pause a transfer. True iff the engine acknowledged the same id.
    pub async fn pause(&self, gid: &str) -> bool {
        match self.call("aria2.pause", vec![json!(gid)]).await {
            Ok(value) => value.as_str() == Some(gid),
            Err(e) => {
                warn!(%gid, "pause failed: {e}");
                false
            }
        }
    }

    /// Resume a paused transfer.
    pub async fn resume(&self, gid: &str) -> bool {
        match self.call("aria2.unpause", vec![json!(gid)]).await {
            Ok(value) => value.as_str() == Some(gid),
            Err(e) => {
                warn!(%gid, "resume failed: {e}");
                false
            }
        }
    }

    /// Cancel a transfer and forget its item mapping.
    pub async fn cancel(&self, gid: &str) -> bool {
        match self.call("aria2.remove", vec![json!(gid)]).await {
            Ok(value) if value.as_str() == Some(gid) => {
                self.transfer_items.write().await.remove(gid);
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!(%gid, "cancel failed: {e}");
                false
            }
        }
    }

    /// Engine-wide throughput counters.
    pub async fn global_stats(&self) -> Result<GlobalStats, AcceleratorError> {
        let result = self.call("aria2.getGlobalStat", vec![]).await?;
        let stat: EngineGlobalStat =
            serde_json::from_value(result).map_err(|e| AcceleratorError::Payload(e.to_string()))?;

        Ok(GlobalStats {
            download_speed_bps: parse_u64(&stat.download_speed),
            upload_speed_bps: parse_u64(&stat.upload_speed),
            active_count: parse_u64(&stat.num_active),
            waiting_count: parse_u64(&stat.num_waiting),
            stopped_count: parse_u64(&stat.num_stopped),
        })
    }

    /// Replace client-held defaults. Applies to future engine startups and
    /// submissions; a running engine is left alone.
    pub async fn configure(&self, settings: EngineSettings) {
        info!(?settings, "accelerator settings updated");
        *self.settings.write().await = settings;
    }

    pub async fn current_settings(&self) -> EngineSettings {
        self.settings.read().await.clone()
    }
}

/// Recover the owning item id from an output filename tagged
/// `<id>_<name>.<ext>` or `<id>.<ext>`.
fn item_id_from_path(path: &str) -> Option<i64> {
    let stem = Path::new(path).file_name()?.to_str()?;
    let digits: String = stem.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    match stem.as_bytes().get(digits.len()) {
        Some(b'_') | Some(b'.') => digits.parse().ok(),
        _ => None,
    }
}
