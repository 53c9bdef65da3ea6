//! Catalog item API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use streamvault_core::catalog::{CatalogError, CatalogItem, ItemStatus, NewItem};
use streamvault_core::gateway::is_local_reference;
use streamvault_core::pipeline::{ExtractorOverride, SpeedProfile};
use streamvault_core::RunOptions;

use crate::state::AppState;

/// Maximum allowed limit for item queries
const MAX_LIMIT: u32 = 1000;

/// Default limit for item queries
const DEFAULT_LIMIT: u32 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating an item
#[derive(Debug, Deserialize)]
pub struct CreateItemBody {
    /// Reference URL or local path to acquire.
    pub url: String,
    pub title: Option<String>,
    pub batch_label: Option<String>,
    /// Queue an ingestion run right away (default true).
    pub auto_ingest: Option<bool>,
    #[serde(default)]
    pub speed: Option<SpeedProfile>,
}

/// Request body for triggering an ingestion run
#[derive(Debug, Default, Deserialize)]
pub struct IngestBody {
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub speed: Option<SpeedProfile>,
    #[serde(default)]
    pub extractor_override: Option<ExtractorOverride>,
}

impl IngestBody {
    fn into_options(self) -> RunOptions {
        RunOptions {
            force: self.force,
            speed: self.speed.unwrap_or_default(),
            extractor_override: self.extractor_override.unwrap_or_default(),
        }
    }
}

/// Request body for batch ingestion
#[derive(Debug, Deserialize)]
pub struct IngestBatchBody {
    pub item_ids: Vec<i64>,
    #[serde(flatten)]
    pub options: IngestBody,
}

/// Query parameters for listing items
#[derive(Debug, Deserialize)]
pub struct ListItemsParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Response for item operations
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: i64,
    pub title: String,
    pub playback_url: String,
    pub source_url: Option<String>,
    pub thumbnail_path: Option<String>,
    pub gif_preview_path: Option<String>,
    pub sprite_path: Option<String>,
    pub duration_seconds: f64,
    pub width: i64,
    pub height: i64,
    pub batch_label: Option<String>,
    pub tags: String,
    pub ai_tags: String,
    pub has_subtitles: bool,
    pub is_favorite: bool,
    pub is_watched: bool,
    pub resume_position_seconds: f64,
    pub status: ItemStatus,
    pub error_message: Option<String>,
    pub created_at: String,
}

impl From<CatalogItem> for ItemResponse {
    fn from(item: CatalogItem) -> Self {
        Self {
            id: item.id,
            title: item.title,
            playback_url: item.playback_url,
            source_url: item.source_url,
            thumbnail_path: item.thumbnail_path,
            gif_preview_path: item.gif_preview_path,
            sprite_path: item.sprite_path,
            duration_seconds: item.duration_seconds,
            width: item.width,
            height: item.height,
            batch_label: item.batch_label,
            tags: item.tags,
            ai_tags: item.ai_tags,
            has_subtitles: item.subtitle_text.is_some(),
            is_favorite: item.is_favorite,
            is_watched: item.is_watched,
            resume_position_seconds: item.resume_position_seconds,
            status: item.status,
            error_message: item.error_message,
            created_at: item.created_at.to_rfc3339(),
        }
    }
}

/// Response for listing items
#[derive(Debug, Serialize)]
pub struct ListItemsResponse {
    pub items: Vec<ItemResponse>,
    pub limit: u32,
    pub offset: u32,
}

/// Response for queued ingestion runs
#[derive(Debug, Serialize)]
pub struct IngestQueuedResponse {
    pub queued: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ItemErrorResponse {
    pub error: String,
}

fn error_status(e: &CatalogError) -> StatusCode {
    match e {
        CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new catalog item, optionally queueing an ingestion run.
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateItemBody>,
) -> Result<(StatusCode, Json<ItemResponse>), (StatusCode, Json<ItemErrorResponse>)> {
    let url = body.url.trim().to_string();
    if url.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ItemErrorResponse {
                error: "url must not be empty".to_string(),
            }),
        ));
    }

    // A local path or direct media URL is playable as-is; everything else
    // waits for the pipeline to resolve a stream.
    let playback_url = if is_local_reference(&url) {
        url.clone()
    } else {
        String::new()
    };

    let new_item = NewItem {
        playback_url,
        source_url: Some(url),
        title: body.title,
        batch_label: body.batch_label,
    };

    let id = state
        .store()
        .insert(new_item)
        .map_err(|e| internal_error(&e))?;

    if body.auto_ingest.unwrap_or(true) {
        let options = RunOptions {
            speed: body.speed.unwrap_or_default(),
            ..Default::default()
        };
        state.pipeline().spawn_run(id, options);
    }

    let item = state.store().get(id).map_err(|e| internal_error(&e))?;
    Ok((StatusCode::CREATED, Json(ItemResponse::from(item))))
}

/// List catalog items.
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListItemsParams>,
) -> Result<Json<ListItemsResponse>, (StatusCode, Json<ItemErrorResponse>)> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let items = state
        .store()
        .list(limit, offset)
        .map_err(|e| internal_error(&e))?;

    Ok(Json(ListItemsResponse {
        items: items.into_iter().map(ItemResponse::from).collect(),
        limit,
        offset,
    }))
}

/// Fetch one catalog item.
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ItemResponse>, (StatusCode, Json<ItemErrorResponse>)> {
    match state.store().get(id) {
        Ok(item) => Ok(Json(ItemResponse::from(item))),
        Err(e) => Err((
            error_status(&e),
            Json(ItemErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}

/// Queue an ingestion run for one item.
pub async fn ingest_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Option<Json<IngestBody>>,
) -> Result<(StatusCode, Json<IngestQueuedResponse>), (StatusCode, Json<ItemErrorResponse>)> {
    // Reject unknown items up front so the caller gets a 404 instead of a
    // silently-dropped background run.
    if let Err(e) = state.store().get(id) {
        return Err((
            error_status(&e),
            Json(ItemErrorResponse {
                error: e.to_string(),
            }),
        ));
    }

    let options = body.map(|Json(b)| b).unwrap_or_default().into_options();
    state.pipeline().spawn_run(id, options);

    Ok((StatusCode::ACCEPTED, Json(IngestQueuedResponse { queued: 1 })))
}

/// Queue ingestion runs for a batch of items. Items run sequentially; one
/// failure never stops the rest.
pub async fn ingest_batch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<IngestBatchBody>,
) -> Result<(StatusCode, Json<IngestQueuedResponse>), (StatusCode, Json<ItemErrorResponse>)> {
    if body.item_ids.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ItemErrorResponse {
                error: "item_ids must not be empty".to_string(),
            }),
        ));
    }

    let queued = body.item_ids.len();
    let options = body.options.into_options();
    let pipeline = Arc::clone(state.pipeline());
    let item_ids = body.item_ids;
    tokio::spawn(async move {
        pipeline.run_batch(&item_ids, options).await;
    });

    Ok((StatusCode::ACCEPTED, Json(IngestQueuedResponse { queued })))
}

fn internal_error(e: &CatalogError) -> (StatusCode, Json<ItemErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ItemErrorResponse {
            error: e.to_string(),
        }),
    )
}
