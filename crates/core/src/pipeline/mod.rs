mod config;
mod runner;
mod text;
mod types;

pub use config::PipelineConfig;
pub use runner::IngestPipeline;
pub use text::{derive_content_tags, flatten_subtitles, title_from_url};
pub use types::{
    ExtractorOverride, PipelineError, RefKind, RunOptions, RunOutcome, SpeedProfile,
};
