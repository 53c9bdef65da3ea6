//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the StreamVault server:
//! - HTTP request metrics (latency, counts)
//! - WebSocket connection metrics
//! - Catalog and transfer status (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "streamvault_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("streamvault_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "streamvault_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "streamvault_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent by type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "streamvault_ws_messages_sent_total",
            "WebSocket messages sent",
        ),
        &["type"],
    )
    .unwrap()
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "streamvault_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Catalog Metrics (collected dynamically)
// =============================================================================

/// Catalog items by lifecycle status.
pub static ITEMS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "streamvault_items_by_status",
            "Current catalog item count by status",
        ),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Transfer Metrics (collected dynamically)
// =============================================================================

/// Active transfers gauge.
pub static TRANSFERS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "streamvault_transfers_active",
        "Number of currently active engine transfers",
    )
    .unwrap()
});

/// Engine-wide download speed.
pub static TRANSFER_SPEED_BPS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "streamvault_transfer_speed_bps",
        "Aggregate engine download speed in bytes per second",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_MESSAGES_SENT.clone()))
        .unwrap();
    registry.register(Box::new(WS_LAG_EVENTS.clone())).unwrap();

    // Catalog
    registry
        .register(Box::new(ITEMS_BY_STATUS.clone()))
        .unwrap();

    // Transfers
    registry
        .register(Box::new(TRANSFERS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(TRANSFER_SPEED_BPS.clone()))
        .unwrap();

    // Core metrics (pipeline, accelerator, gateway)
    for metric in streamvault_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the engine's live counters. The
/// engine being down just leaves the previous values in place.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    if let Ok(stats) = state.accelerator().global_stats().await {
        TRANSFERS_ACTIVE.set(stats.active_count as i64);
        TRANSFER_SPEED_BPS.set(stats.download_speed_bps as i64);
    }

    if let Ok(items) = state.store().list(10_000, 0) {
        for status in ["pending", "processing", "downloading", "ready", "error"] {
            let count = items.iter().filter(|i| i.status.as_str() == status).count();
            ITEMS_BY_STATUS
                .with_label_values(&[status])
                .set(count as i64);
        }
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();
    numeric_regex.replace_all(path, "/{id}$1").to_string()
}
