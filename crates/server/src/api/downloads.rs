//! Download accelerator API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use streamvault_core::accelerator::{
    AcceleratorError, DownloadTask, EngineSettings, GlobalStats,
};
use streamvault_core::catalog::ItemStatus;
use tracing::warn;

use crate::state::AppState;

/// How many finished transfers to report.
const FINISHED_LIMIT: u32 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for submitting a transfer
#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub url: String,
    /// Catalog item the transfer belongs to.
    pub item_id: i64,
    /// Output filename override.
    pub filename: Option<String>,
}

/// Response for a submitted transfer
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub transfer_id: String,
}

/// Response listing transfers
#[derive(Debug, Serialize)]
pub struct ListDownloadsResponse {
    pub active: Vec<DownloadTask>,
    pub finished: Vec<DownloadTask>,
}

/// Response for pause/resume/cancel
#[derive(Debug, Serialize)]
pub struct TransferActionResponse {
    pub transfer_id: String,
    pub ok: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct DownloadErrorResponse {
    pub error: String,
}

fn error_response(e: AcceleratorError) -> (StatusCode, Json<DownloadErrorResponse>) {
    let status = match &e {
        AcceleratorError::EngineUnavailable(_) | AcceleratorError::StartupFailed(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(DownloadErrorResponse {
            error: e.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a URL for accelerated download.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitBody>,
) -> Result<(StatusCode, Json<SubmitResponse>), (StatusCode, Json<DownloadErrorResponse>)> {
    if body.url.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(DownloadErrorResponse {
                error: "url must not be empty".to_string(),
            }),
        ));
    }

    let transfer_id = state
        .accelerator()
        .submit(&body.url, body.item_id, body.filename)
        .await
        .map_err(error_response)?;

    // The watcher folds progress in from here; the item leaves pending now.
    match state
        .store()
        .set_status(body.item_id, ItemStatus::Downloading, None)
    {
        Ok(()) => {
            state
                .broadcaster()
                .item_updated(body.item_id, ItemStatus::Downloading, None, None, None);
        }
        Err(e) => warn!(item_id = body.item_id, "could not mark item downloading: {e}"),
    }

    Ok((StatusCode::CREATED, Json(SubmitResponse { transfer_id })))
}

/// List active and recently finished transfers.
pub async fn list_downloads(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListDownloadsResponse>, (StatusCode, Json<DownloadErrorResponse>)> {
    let active = state
        .accelerator()
        .list_active()
        .await
        .map_err(error_response)?;
    let finished = state
        .accelerator()
        .list_finished(FINISHED_LIMIT)
        .await
        .map_err(error_response)?;

    Ok(Json(ListDownloadsResponse { active, finished }))
}

/// Fetch one transfer.
pub async fn get_download(
    State(state): State<Arc<AppState>>,
    Path(gid): Path<String>,
) -> Result<Json<DownloadTask>, (StatusCode, Json<DownloadErrorResponse>)> {
    state
        .accelerator()
        .status(&gid)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Pause a transfer.
pub async fn pause_download(
    State(state): State<Arc<AppState>>,
    Path(gid): Path<String>,
) -> Json<TransferActionResponse> {
    let ok = state.accelerator().pause(&gid).await;
    Json(TransferActionResponse {
        transfer_id: gid,
        ok,
    })
}

/// Resume a paused transfer.
pub async fn resume_download(
    State(state): State<Arc<AppState>>,
    Path(gid): Path<String>,
) -> Json<TransferActionResponse> {
    let ok = state.accelerator().resume(&gid).await;
    Json(TransferActionResponse {
        transfer_id: gid,
        ok,
    })
}

/// Cancel a transfer and forget its item mapping.
pub async fn cancel_download(
    State(state): State<Arc<AppState>>,
    Path(gid): Path<String>,
) -> Json<TransferActionResponse> {
    let ok = state.accelerator().cancel(&gid).await;
    Json(TransferActionResponse {
        transfer_id: gid,
        ok,
    })
}

/// Engine-wide throughput counters.
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GlobalStats>, (StatusCode, Json<DownloadErrorResponse>)> {
    state
        .accelerator()
        .global_stats()
        .await
        .map(Json)
        .map_err(error_response)
}

/// Current engine tunables.
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<EngineSettings> {
    Json(state.accelerator().current_settings().await)
}

/// Replace engine tunables. Applies to future submissions only.
pub async fn put_settings(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<EngineSettings>,
) -> Json<EngineSettings> {
    state.accelerator().configure(settings.clone()).await;
    Json(settings)
}
