//! Generic page scraper.
//!
//! Best-effort heuristics for arbitrary pages: social-preview title, native
//! video element, embedded manifest link, direct media-file link - in that
//! order, first match wins.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::{debug, warn};

use super::{ExtractionResult, ExtractionStrategy};

static RE_OG_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<meta property="og:title" content="([^"]*)""#).unwrap());
static RE_TITLE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<title>\s*([^<]+?)\s*</title>").unwrap());
static RE_VIDEO_SRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<video[^>]+src=["']([^"']+)["']"#).unwrap());
static RE_M3U8_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:src|href)=["']([^"']+\.m3u8[^"']*)["']"#).unwrap());
static RE_MP4_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:src|href)=["']([^"']+\.mp4[^"']*)["']"#).unwrap());

/// Generic scraper applicable to any remote page.
pub struct GenericScraper {
    client: reqwest::Client,
}

impl GenericScraper {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Resolve a possibly-relative link against the page URL.
    fn resolve_link(page_url: &str, link: &str) -> String {
        if link.starts_with("http://") || link.starts_with("https://") {
            return link.to_string();
        }
        let (scheme, rest) = match page_url.split_once("://") {
            Some(parts) => parts,
            None => return link.to_string(),
        };
        let host = rest.split('/').next().unwrap_or(rest);

        if let Some(proto_relative) = link.strip_prefix("//") {
            return format!("{scheme}://{proto_relative}");
        }
        if link.starts_with('/') {
            return format!("{scheme}://{host}{link}");
        }
        // Relative to the page's directory
        let base = match page_url.rfind('/') {
            Some(idx) if idx > scheme.len() + 2 => &page_url[..idx],
            _ => page_url,
        };
        format!("{base}/{link}")
    }

    fn parse_page(page_url: &str, html: &str) -> ExtractionResult {
        let capture = |re: &Regex| {
            re.captures(html)
                .map(|c| c[1].to_string())
                .filter(|s| !s.is_empty())
        };

        let title = capture(&RE_OG_TITLE).or_else(|| capture(&RE_TITLE_TAG));

        let stream_url = capture(&RE_VIDEO_SRC)
            .or_else(|| capture(&RE_M3U8_LINK))
            .or_else(|| capture(&RE_MP4_LINK))
            .map(|link| Self::resolve_link(page_url, &link));

        ExtractionResult {
            title,
            stream_url,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ExtractionStrategy for GenericScraper {
    fn name(&self) -> &str {
        "generic_scraper"
    }

    async fn attempt(&self, url: &str) -> ExtractionResult {
        let html = match self.client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(%url, "generic scraper failed reading body: {e}");
                    return ExtractionResult::default();
                }
            },
            Ok(resp) => {
                warn!(%url, status = %resp.status(), "generic scraper got non-success page");
                return ExtractionResult::default();
            }
            Err(e) => {
                warn!(%url, "generic scraper fetch failed: {e}");
                return ExtractionResult::default();
            }
        };

        let result = Self::parse_page(url, &html);
        debug!(%url, found_stream = result.stream_url.is_some(), "generic scraper finished");
        result
    }
}
