//! Transfer watcher.
//!
//! Bridges engine-side transfer state into the catalog: active transfers
//! emit progress updates and mark their item `Downloading`, terminal
//! transfers commit the validated outcome exactly once.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::catalog::{ItemStatus, ItemStore};
use crate::status::StatusBroadcaster;

use super::{Aria2Client, DownloadTask, EngineStatus};

/// How many stopped transfers each poll inspects.
const FINISHED_SCAN_LIMIT: u32 = 50;

/// Periodic poller folding engine transfer state into the catalog.
pub struct TransferWatcher {
    client: Arc<Aria2Client>,
    store: Arc<dyn ItemStore>,
    broadcaster: StatusBroadcaster,
    interval: Duration,
}

impl TransferWatcher {
    pub fn new(
        client: Arc<Aria2Client>,
        store: Arc<dyn ItemStore>,
        broadcaster: StatusBroadcaster,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            store,
            broadcaster,
            interval,
        }
    }

    /// Poll the engine until the process exits.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// One poll cycle. Engine downtime is quiet; the next cycle retries.
    pub async fn tick(&self) {
        let active = match self.client.list_active().await {
            Ok(active) => active,
            Err(e) => {
                debug!("engine poll skipped: {e}");
                return;
            }
        };
        let finished = match self.client.list_finished(FINISHED_SCAN_LIMIT).await {
            Ok(finished) => finished,
            Err(e) => {
                debug!("finished-transfer poll skipped: {e}");
                Vec::new()
            }
        };

        apply_transfer_updates(self.store.as_ref(), &self.broadcaster, &active, &finished);
    }
}

/// Fold one poll's transfer state into the catalog. Terminal transitions
/// only apply to items still marked `Downloading`, so a transfer that keeps
/// appearing in the stopped list commits once.
fn apply_transfer_updates(
    store: &dyn ItemStore,
    broadcaster: &StatusBroadcaster,
    active: &[DownloadTask],
    finished: &[DownloadTask],
) {
    for task in active {
        broadcaster.download_progress(
            &task.transfer_id,
            task.catalog_item_id,
            task.completed_bytes,
            task.total_bytes,
            task.speed_bps,
        );

        let Some(item_id) = task.catalog_item_id else {
            continue;
        };
        let Ok(item) = store.get(item_id) else {
            continue;
        };
        if item.status == ItemStatus::Downloading || item.status == ItemStatus::Processing {
            continue;
        }
        match store.set_status(item_id, ItemStatus::Downloading, None) {
            Ok(()) => {
                broadcaster.item_updated(item_id, ItemStatus::Downloading, None, None, None)
            }
            Err(e) => warn!(item_id, "could not mark item downloading: {e}"),
        }
    }

    for task in finished {
        let Some(item_id) = task.catalog_item_id else {
            continue;
        };
        let Ok(item) = store.get(item_id) else {
            continue;
        };
        if item.status != ItemStatus::Downloading {
            continue;
        }

        match task.engine_status {
            EngineStatus::Complete => {
                let Some(file) = task.files.first() else {
                    continue;
                };
                if let Err(e) = store.set_playback_url(item_id, &file.path) {
                    warn!(item_id, "could not persist downloaded path: {e}");
                    continue;
                }
                if let Err(e) = store.set_status(item_id, ItemStatus::Ready, None) {
                    warn!(item_id, "could not mark item ready: {e}");
                    continue;
                }
                info!(
                    item_id,
                    transfer_id = %task.transfer_id,
                    path = %file.path,
                    "transfer complete"
                );
                broadcaster.item_updated(item_id, ItemStatus::Ready, None, None, None);
            }
            EngineStatus::Error => {
                let message = task
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "transfer failed".to_string());
                match store.set_status(item_id, ItemStatus::Error, Some(&message)) {
                    Ok(()) => broadcaster.item_updated(
                        item_id,
                        ItemStatus::Error,
                        None,
                        None,
                        Some(&message),
                    ),
                    Err(e) => warn!(item_id, "could not mark item failed: {e}"),
                }
            }
            EngineStatus::Removed => {
                let message = "transfer cancelled";
                match store.set_status(item_id, ItemStatus::Error, Some(message)) {
                    Ok(()) => broadcaster.item_updated(
                        item_id,
                        ItemStatus::Error,
                        None,
                        None,
                        Some(message),
                    ),
                    Err(e) => warn!(item_id, "could not mark item cancelled: {e}"),
                }
            }
            EngineStatus::Active | EngineStatus::Waiting | EngineStatus::Paused => {}
        }
    }
}
