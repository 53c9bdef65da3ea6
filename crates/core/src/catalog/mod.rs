//! Catalog item persistence.
//!
//! The catalog is the single source of truth for item lifecycle state. It is
//! written by the ingestion pipeline, the download accelerator's validation
//! path, and the stream gateway's URL refresh.

mod sqlite;
mod types;

pub use sqlite::SqliteStore;
pub use types::*;
