//! Source extraction strategies.
//!
//! Interchangeable, best-effort resolvers that turn a reference URL into
//! partial playable metadata. The pipeline runs them in priority order and
//! merges the results; no strategy failure ever aborts an ingestion run.

mod generic_scraper;
mod host_scraper;
mod segmented_host;
mod types;
mod ytdlp;

pub use generic_scraper::GenericScraper;
pub use host_scraper::HostScraper;
pub use segmented_host::SegmentedHostClient;
pub use types::*;
pub use ytdlp::YtDlpExtractor;
