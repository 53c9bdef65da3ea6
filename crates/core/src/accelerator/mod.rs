//! Download accelerator client.
//!
//! Delegates bulk transfers to an external segmented-download engine over
//! JSON-RPC 2.0 and validates that what landed on disk is actually media.

mod aria2;
mod types;
mod watcher;

pub use aria2::Aria2Client;
pub use types::*;
pub use watcher::TransferWatcher;
