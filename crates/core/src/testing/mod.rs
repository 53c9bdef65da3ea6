//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of the extraction and probing
//! traits, allowing ingestion lifecycle testing without real pages, external
//! tools, or a toolchain install.

mod mock_fallback;
mod mock_probe;
mod mock_strategy;

pub use mock_fallback::{MockFallback, RecordedExtraction};
pub use mock_probe::MockProbe;
pub use mock_strategy::MockStrategy;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::catalog::NewItem;
    use crate::extractor::ExtractionResult;

    /// Create a new-item payload pointing at a remote page.
    pub fn remote_item(source_url: &str) -> NewItem {
        NewItem {
            playback_url: String::new(),
            source_url: Some(source_url.to_string()),
            title: None,
            batch_label: None,
        }
    }

    /// Create a new-item payload for an already-playable URL.
    pub fn direct_item(playback_url: &str, title: &str) -> NewItem {
        NewItem {
            playback_url: playback_url.to_string(),
            source_url: None,
            title: Some(title.to_string()),
            batch_label: None,
        }
    }

    /// Create an extraction result with a title and a stream, the shape a
    /// successful page scrape produces.
    pub fn scraped_result(title: &str, stream_url: &str) -> ExtractionResult {
        ExtractionResult {
            title: Some(title.to_string()),
            stream_url: Some(stream_url.to_string()),
            duration_seconds: Some(120.0),
            ..Default::default()
        }
    }
}
