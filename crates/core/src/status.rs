//! Best-effort fan-out of lifecycle transitions.
//!
//! The pipeline and accelerator publish updates here; the server bridges
//! subscribers onto WebSocket connections. Delivery is fire-and-forget: a
//! slow or absent observer never blocks the publisher.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::catalog::ItemStatus;

/// Update pushed to connected observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusUpdate {
    /// A catalog item changed lifecycle state.
    ItemUpdate {
        item_id: i64,
        status: ItemStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        thumbnail_path: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
    /// Progress for an engine-managed bulk transfer.
    DownloadProgress {
        transfer_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        item_id: Option<i64>,
        completed_bytes: u64,
        total_bytes: u64,
        speed_bps: u64,
    },
    /// Periodic keep-alive.
    Heartbeat { timestamp: i64 },
}

/// Broadcaster over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct StatusBroadcaster {
    sender: broadcast::Sender<StatusUpdate>,
}

impl StatusBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast an update to all connected observers.
    pub fn broadcast(&self, update: StatusUpdate) {
        // Ignore send errors - they just mean no one is listening
        let _ = self.sender.send(update);
    }

    /// Subscribe to receive updates.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.sender.subscribe()
    }

    /// Convenience method for an item lifecycle transition.
    pub fn item_updated(
        &self,
        item_id: i64,
        status: ItemStatus,
        title: Option<&str>,
        thumbnail_path: Option<&str>,
        error_message: Option<&str>,
    ) {
        self.broadcast(StatusUpdate::ItemUpdate {
            item_id,
            status,
            title: title.map(str::to_string),
            thumbnail_path: thumbnail_path.map(str::to_string),
            error_message: error_message.map(str::to_string),
        });
    }

    /// Convenience method for transfer progress.
    pub fn download_progress(
        &self,
        transfer_id: &str,
        item_id: Option<i64>,
        completed_bytes: u64,
        total_bytes: u64,
        speed_bps: u64,
    ) {
        self.broadcast(StatusUpdate::DownloadProgress {
            transfer_id: transfer_id.to_string(),
            item_id,
            completed_bytes,
            total_bytes,
            speed_bps,
        });
    }
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
