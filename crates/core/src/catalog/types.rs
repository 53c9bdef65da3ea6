//! Catalog item types shared across the pipeline, gateway, and accelerator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Created, no ingestion attempted yet.
    Pending,
    /// An ingestion run owns the item right now.
    Processing,
    /// A bulk transfer for the item is in flight.
    Downloading,
    /// Playable: `playback_url` is resolved and non-empty.
    Ready,
    /// Terminal failure: `error_message` explains why.
    Error,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Downloading => "downloading",
            ItemStatus::Ready => "ready",
            ItemStatus::Error => "error",
        }
    }

    /// Parse a status string as stored in the database.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ItemStatus::Pending),
            "processing" => Some(ItemStatus::Processing),
            "downloading" => Some(ItemStatus::Downloading),
            "ready" => Some(ItemStatus::Ready),
            "error" => Some(ItemStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked media entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i64,
    pub title: String,
    /// Current resolved stream location. Mutable; refreshed by the gateway
    /// when an upstream link expires.
    pub playback_url: String,
    /// Original reference the item was imported from. Immutable once set;
    /// used for re-resolution.
    pub source_url: Option<String>,
    pub thumbnail_path: Option<String>,
    pub gif_preview_path: Option<String>,
    pub sprite_path: Option<String>,
    pub duration_seconds: f64,
    pub width: i64,
    pub height: i64,
    pub batch_label: Option<String>,
    /// Comma-joined tag set. Duplicates tolerated, order irrelevant.
    pub tags: String,
    /// Derived tags from the noun-extraction pass, same encoding as `tags`.
    pub ai_tags: String,
    pub subtitle_text: Option<String>,
    pub is_favorite: bool,
    pub is_watched: bool,
    pub resume_position_seconds: f64,
    pub status: ItemStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating a new catalog item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewItem {
    pub playback_url: String,
    pub source_url: Option<String>,
    pub title: Option<String>,
    pub batch_label: Option<String>,
}

/// Partial metadata update produced by an ingestion run. `None` fields are
/// left untouched in the stored row.
#[derive(Debug, Clone, Default)]
pub struct MetadataPatch {
    pub title: Option<String>,
    pub duration_seconds: Option<f64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub tags: Option<String>,
    pub ai_tags: Option<String>,
}

/// Errors from the catalog persistence layer.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Database(String),

    #[error("item not found: {0}")]
    NotFound(i64),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Persistence seam for catalog items. Implementations must tolerate
/// concurrent writers (pipeline runs, accelerator validation, and gateway
/// refreshes can all commit at the same time).
pub trait ItemStore: Send + Sync {
    fn insert(&self, item: NewItem) -> Result<i64, CatalogError>;

    fn get(&self, id: i64) -> Result<CatalogItem, CatalogError>;

    fn list(&self, limit: u32, offset: u32) -> Result<Vec<CatalogItem>, CatalogError>;

    /// Transition the item's status. When `status` is [`ItemStatus::Error`]
    /// the message is stored (a generic one is substituted if empty);
    /// otherwise any previous error message is cleared.
    fn set_status(
        &self,
        id: i64,
        status: ItemStatus,
        error_message: Option<&str>,
    ) -> Result<(), CatalogError>;

    fn apply_metadata(&self, id: i64, patch: &MetadataPatch) -> Result<(), CatalogError>;

    fn set_playback_url(&self, id: i64, url: &str) -> Result<(), CatalogError>;

    fn set_visuals(
        &self,
        id: i64,
        thumbnail_path: Option<&str>,
        gif_preview_path: Option<&str>,
    ) -> Result<(), CatalogError>;

    fn set_subtitle(&self, id: i64, text: &str) -> Result<(), CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ItemStatus::Pending,
            ItemStatus::Processing,
            ItemStatus::Downloading,
            ItemStatus::Ready,
            ItemStatus::Error,
        ] {
            assert_eq!(ItemStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_status_parse_unknown() {
        assert_eq!(ItemStatus::parse("queued"), None);
        assert_eq!(ItemStatus::parse(""), None);
    }

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&ItemStatus::Ready).unwrap();
        assert_eq!(json, "\"ready\"");
        let parsed: ItemStatus = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(parsed, ItemStatus::Error);
    }
}
