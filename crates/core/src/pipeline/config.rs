//! Pipeline configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory where generated thumbnails and preview clips land.
    #[serde(default = "default_preview_dir")]
    pub preview_dir: String,
    /// Cap on ingestion runs executing at once.
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,
    /// Timeout for downloading a scraped thumbnail image.
    #[serde(default = "default_thumbnail_download_timeout_secs")]
    pub thumbnail_download_timeout_secs: u64,
    /// Tighter timeout used under the turbo profile.
    #[serde(default = "default_turbo_thumbnail_timeout_secs")]
    pub turbo_thumbnail_timeout_secs: u64,
    /// Vocabulary matched against the title to derive tags when the
    /// extraction chain supplied none.
    #[serde(default = "default_keyword_tags")]
    pub keyword_tags: Vec<String>,
    /// Derive heuristic content tags from the title and description.
    #[serde(default)]
    pub derive_ai_tags: bool,
}

fn default_preview_dir() -> String {
    "./previews".to_string()
}

fn default_max_concurrent_runs() -> usize {
    2
}

fn default_thumbnail_download_timeout_secs() -> u64 {
    10
}

fn default_turbo_thumbnail_timeout_secs() -> u64 {
    5
}

fn default_keyword_tags() -> Vec<String> {
    ["4k", "hd", "vlog", "gameplay", "pov", "asmr"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preview_dir: default_preview_dir(),
            max_concurrent_runs: default_max_concurrent_runs(),
            thumbnail_download_timeout_secs: default_thumbnail_download_timeout_secs(),
            turbo_thumbnail_timeout_secs: default_turbo_thumbnail_timeout_secs(),
            keyword_tags: default_keyword_tags(),
            derive_ai_tags: false,
        }
    }
}
