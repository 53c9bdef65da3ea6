//! Ingestion pipeline types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CatalogError;

/// Named configuration trimming which pipeline stages execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedProfile {
    /// Everything: fallback tool, subtitles, thumbnail and preview clip.
    Default,
    /// Fallback tool only when the title is missing; no subtitles, no
    /// preview clip.
    Fast,
    /// Scrapers only; no fallback tool, no subtitles, no generated visuals.
    Turbo,
}

impl SpeedProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeedProfile::Default => "default",
            SpeedProfile::Fast => "fast",
            SpeedProfile::Turbo => "turbo",
        }
    }
}

impl Default for SpeedProfile {
    fn default() -> Self {
        SpeedProfile::Default
    }
}

/// Caller-requested narrowing of the extraction sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorOverride {
    /// Normal priority chain with profile gating.
    Auto,
    /// Force the fallback tool regardless of profile gating.
    FallbackOnly,
    /// Skip the fallback tool entirely; technical metadata from the probe.
    ProbeOnly,
}

impl Default for ExtractorOverride {
    fn default() -> Self {
        ExtractorOverride::Auto
    }
}

/// Options for one ingestion run.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RunOptions {
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub speed: SpeedProfile,
    #[serde(default)]
    pub extractor_override: ExtractorOverride,
}

/// Terminal outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Item committed as ready.
    Completed,
    /// Item was already ready with an existing thumbnail; nothing done.
    Skipped,
    /// Item committed as error.
    Failed { message: String },
}

/// How the reference URL is classified before extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefKind {
    /// Path under the media root; no extraction needed.
    LocalFile,
    /// Remote URL pointing straight at a media file.
    DirectFile,
    /// Known segmented-capable host; direct fetch plus metadata API.
    SegmentedHost { file_id: String },
    /// Anything else: scrape it.
    Generic,
}

/// Failures that escape the whole per-item pipeline and become the item's
/// terminal error state.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("no playable stream resolved")]
    Unplayable,
}
