//! Stream gateway API handler.
//!
//! Serves item bytes to media players: local files go through tower's
//! Range-aware file service, remote streams are relayed chunkwise with the
//! upstream's status and content headers preserved.

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::warn;

use streamvault_core::gateway::{GatewayError, ServeOutcome};

use crate::state::AppState;

/// Error response
#[derive(Debug, Serialize)]
pub struct StreamErrorResponse {
    pub error: String,
}

fn error_response(e: GatewayError) -> Response {
    let status = match &e {
        GatewayError::NotFound(_) | GatewayError::NoStream(_) | GatewayError::MissingFile(_) => {
            StatusCode::NOT_FOUND
        }
        GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
        GatewayError::Upstream { .. } | GatewayError::Fetch(_) => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(StreamErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

/// Serve item bytes, forwarding the player's `Range` header upstream.
pub async fn stream_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Response {
    let range = request
        .headers()
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match state.gateway().serve(id, range.as_deref()).await {
        Ok(ServeOutcome::LocalFile { path }) => {
            match ServeFile::new(&path).oneshot(request).await {
                Ok(response) => response.map(Body::new),
                Err(e) => {
                    warn!(item_id = id, path = %path.display(), "file serve failed: {e}");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
        Ok(ServeOutcome::Relay { upstream }) => relay_response(upstream),
        Err(e) => error_response(e),
    }
}

/// Turn the upstream response into ours: status and content headers pass
/// through, the body streams without buffering.
fn relay_response(upstream: reqwest::Response) -> Response {
    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);

    let mut response = Response::builder().status(status);
    if let Some(headers) = response.headers_mut() {
        for name in [
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::CONTENT_RANGE,
            header::ACCEPT_RANGES,
        ] {
            if let Some(value) = upstream.headers().get(&name) {
                headers.insert(name.clone(), value.clone());
            }
        }
    }

    let body = Body::from_stream(upstream.bytes_stream());
    response
        .body(body)
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}
