//! HTTP server for the StreamVault media acquisition service.
//!
//! The binary in `main.rs` wires configuration, the catalog store, the
//! ingestion pipeline, the download accelerator and the stream gateway into
//! an axum application built by [`api::create_router`].

pub mod api;
pub mod metrics;
pub mod state;
