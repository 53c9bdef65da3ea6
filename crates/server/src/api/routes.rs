use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{downloads, handlers, items, stream, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Catalog items
        .route("/items", post(items::create_item))
        .route("/items", get(items::list_items))
        .route("/items/{id}", get(items::get_item))
        .route("/items/{id}/ingest", post(items::ingest_item))
        .route("/items/ingest-batch", post(items::ingest_batch))
        // Stream gateway
        .route("/stream/{id}", get(stream::stream_item))
        // Download accelerator
        .route("/downloads", post(downloads::submit))
        .route("/downloads", get(downloads::list_downloads))
        .route("/downloads/stats", get(downloads::get_stats))
        .route("/downloads/config", get(downloads::get_settings))
        .route("/downloads/config", put(downloads::put_settings))
        .route("/downloads/{gid}", get(downloads::get_download))
        .route("/downloads/{gid}", delete(downloads::cancel_download))
        .route("/downloads/{gid}/pause", post(downloads::pause_download))
        .route("/downloads/{gid}/resume", post(downloads::resume_download))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
