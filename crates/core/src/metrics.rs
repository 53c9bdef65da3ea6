//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ingestion pipeline (runs, durations, strategy failures)
//! - Download accelerator (submissions, validation reclassifications)
//! - Stream gateway (relays, refreshes)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Ingestion runs total by outcome.
pub static PIPELINE_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("streamvault_pipeline_runs_total", "Total ingestion runs"),
        &["outcome"], // "completed", "skipped", "failed"
    )
    .unwrap()
});

/// Ingestion run duration in seconds.
pub static PIPELINE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "streamvault_pipeline_duration_seconds",
            "Duration of ingestion runs",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["speed_profile"],
    )
    .unwrap()
});

/// Extraction attempts total by strategy and result.
pub static EXTRACTION_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "streamvault_extraction_attempts_total",
            "Total extraction strategy attempts",
        ),
        &["strategy", "result"], // result: "hit", "empty"
    )
    .unwrap()
});

// =============================================================================
// Accelerator Metrics
// =============================================================================

/// Transfers submitted to the external engine.
pub static TRANSFERS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "streamvault_transfers_submitted_total",
        "Total transfers submitted to the download engine",
    )
    .unwrap()
});

/// Completed transfers reclassified as errors by the size validation rule.
pub static TRANSFERS_RECLASSIFIED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "streamvault_transfers_reclassified_total",
        "Completed transfers reclassified as too small to be real media",
    )
    .unwrap()
});

// =============================================================================
// Gateway Metrics
// =============================================================================

/// Gateway serve requests by outcome.
pub static GATEWAY_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("streamvault_gateway_requests_total", "Total gateway serves"),
        &["outcome"], // "local", "relay", "not_found", "upstream_failure"
    )
    .unwrap()
});

/// JIT stream-URL refresh attempts by result.
pub static GATEWAY_REFRESHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "streamvault_gateway_refreshes_total",
            "On-demand stream URL refreshes",
        ),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(PIPELINE_RUNS.clone()),
        Box::new(PIPELINE_DURATION.clone()),
        Box::new(EXTRACTION_ATTEMPTS.clone()),
        Box::new(TRANSFERS_SUBMITTED.clone()),
        Box::new(TRANSFERS_RECLASSIFIED.clone()),
        Box::new(GATEWAY_REQUESTS.clone()),
        Box::new(GATEWAY_REFRESHES.clone()),
    ]
}
