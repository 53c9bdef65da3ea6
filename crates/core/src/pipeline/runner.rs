//! Per-item ingestion runner.
//!
//! One run owns an item from `processing` to a terminal `ready` or `error`.
//! Extraction sources are tried in priority order and their partial results
//! merged, then the probe fills remaining technical gaps, then visuals are
//! generated. Every stage after the initial commit is best-effort except the
//! playability guard: an item with no resolvable stream ends in `error`.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, CatalogItem, ItemStatus, ItemStore, MetadataPatch};
use crate::extractor::{
    ExtractionResult, ExtractionStrategy, FallbackExtractor, SegmentedHostClient,
};
use crate::gateway::is_local_reference;
use crate::metrics::{EXTRACTION_ATTEMPTS, PIPELINE_DURATION, PIPELINE_RUNS};
use crate::probe::MediaProbe;
use crate::status::StatusBroadcaster;

use super::text::{
    derive_content_tags, flatten_subtitles, is_synthetic_title, keyword_tags, should_replace_title,
    title_from_url,
};
use super::{
    ExtractorOverride, PipelineConfig, PipelineError, RefKind, RunOptions, RunOutcome,
    SpeedProfile,
};

const MEDIA_EXTENSIONS: &[&str] = &[".mp4", ".m3u8", ".webm", ".mkv", ".mov", ".avi"];

/// Orchestrates extraction, probing and visual generation for catalog items.
pub struct IngestPipeline {
    store: Arc<dyn ItemStore>,
    host_strategy: Arc<dyn ExtractionStrategy>,
    generic_strategy: Arc<dyn ExtractionStrategy>,
    segmented: Arc<SegmentedHostClient>,
    fallback: Arc<dyn FallbackExtractor>,
    probe: Arc<dyn MediaProbe>,
    broadcaster: StatusBroadcaster,
    client: reqwest::Client,
    config: PipelineConfig,
    run_permits: Arc<Semaphore>,
}

impl IngestPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ItemStore>,
        host_strategy: Arc<dyn ExtractionStrategy>,
        generic_strategy: Arc<dyn ExtractionStrategy>,
        segmented: Arc<SegmentedHostClient>,
        fallback: Arc<dyn FallbackExtractor>,
        probe: Arc<dyn MediaProbe>,
        broadcaster: StatusBroadcaster,
        client: reqwest::Client,
        config: PipelineConfig,
    ) -> Self {
        let run_permits = Arc::new(Semaphore::new(config.max_concurrent_runs.max(1)));
        Self {
            store,
            host_strategy,
            generic_strategy,
            segmented,
            fallback,
            probe,
            broadcaster,
            client,
            config,
            run_permits,
        }
    }

    /// Classify the item's reference to pick the extraction path.
    pub fn classify(&self, reference: &str) -> RefKind {
        if is_local_reference(reference) {
            return RefKind::LocalFile;
        }
        if let Some(file_id) = self.segmented.file_id(reference) {
            return RefKind::SegmentedHost { file_id };
        }
        if looks_like_media_file(reference) {
            return RefKind::DirectFile;
        }
        RefKind::Generic
    }

    /// Run the full pipeline for one item.
    ///
    /// Catalog errors on the initial fetch and on status commits propagate;
    /// everything else is folded into the item's terminal state.
    pub async fn run(&self, item_id: i64, options: RunOptions) -> Result<RunOutcome, CatalogError> {
        let item = self.store.get(item_id)?;

        if !options.force && already_ingested(&item) {
            debug!(item_id, "already ingested, skipping");
            PIPELINE_RUNS.with_label_values(&["skipped"]).inc();
            return Ok(RunOutcome::Skipped);
        }

        self.store.set_status(item_id, ItemStatus::Processing, None)?;
        self.broadcaster
            .item_updated(item_id, ItemStatus::Processing, Some(&item.title), None, None);

        let started = Instant::now();
        let outcome = match self.run_inner(&item, &options).await {
            Ok(()) => {
                let updated = self.store.get(item_id)?;
                self.store.set_status(item_id, ItemStatus::Ready, None)?;
                self.broadcaster.item_updated(
                    item_id,
                    ItemStatus::Ready,
                    Some(&updated.title),
                    updated.thumbnail_path.as_deref(),
                    None,
                );
                info!(item_id, title = %updated.title, "ingestion complete");
                PIPELINE_RUNS.with_label_values(&["completed"]).inc();
                RunOutcome::Completed
            }
            Err(e) => {
                let message = e.to_string();
                self.store
                    .set_status(item_id, ItemStatus::Error, Some(&message))?;
                self.broadcaster.item_updated(
                    item_id,
                    ItemStatus::Error,
                    Some(&item.title),
                    None,
                    Some(&message),
                );
                warn!(item_id, "ingestion failed: {message}");
                PIPELINE_RUNS.with_label_values(&["failed"]).inc();
                RunOutcome::Failed { message }
            }
        };

        PIPELINE_DURATION
            .with_label_values(&[options.speed.as_str()])
            .observe(started.elapsed().as_secs_f64());

        Ok(outcome)
    }

    /// Run the pipeline for several items sequentially. One item's failure
    /// never stops the rest of the batch.
    pub async fn run_batch(&self, item_ids: &[i64], options: RunOptions) -> Vec<(i64, RunOutcome)> {
        let mut outcomes = Vec::with_capacity(item_ids.len());
        for &item_id in item_ids {
            let outcome = match self.run(item_id, options).await {
                Ok(outcome) => outcome,
                Err(e) => RunOutcome::Failed {
                    message: e.to_string(),
                },
            };
            outcomes.push((item_id, outcome));
        }
        outcomes
    }

    /// Fire-and-forget run, bounded by the concurrency permit pool.
    pub fn spawn_run(self: &Arc<Self>, item_id: i64, options: RunOptions) {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            let permit = pipeline.run_permits.clone().acquire_owned().await;
            if permit.is_err() {
                return;
            }
            if let Err(e) = pipeline.run(item_id, options).await {
                warn!(item_id, "background ingestion aborted: {e}");
            }
        });
    }

    async fn run_inner(&self, item: &CatalogItem, options: &RunOptions) -> Result<(), PipelineError> {
        let reference = item
            .source_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| item.playback_url.clone());
        let kind = self.classify(&reference);
        debug!(item_id = item.id, ?kind, %reference, "classified reference");

        let mut extracted = self.extract(&reference, &kind, options).await;

        let want_subtitles = !matches!(options.speed, SpeedProfile::Fast | SpeedProfile::Turbo)
            && options.extractor_override != ExtractorOverride::ProbeOnly;

        if fallback_wanted(&kind, &extracted, options) {
            match self
                .fallback
                .extract(&reference, item.id, want_subtitles)
                .await
            {
                Ok(result) => {
                    record_attempt("fallback", &result);
                    extracted.merge_from(result);
                }
                Err(e) => {
                    record_attempt("fallback", &ExtractionResult::default());
                    warn!(item_id = item.id, "fallback extraction failed: {e}");
                }
            }
        }

        if matches!(kind, RefKind::DirectFile) && extracted.stream_url.is_none() {
            extracted.stream_url = Some(reference.clone());
        }

        let locator = extracted.stream_url.clone().or_else(|| match kind {
            RefKind::LocalFile => Some(item.playback_url.clone()),
            _ => None,
        });

        self.probe_fill(&mut extracted, locator.as_deref(), options)
            .await;

        if let Some(stream_url) = &extracted.stream_url {
            self.store.set_playback_url(item.id, stream_url)?;
        }
        let playback = extracted
            .stream_url
            .clone()
            .unwrap_or_else(|| item.playback_url.clone());
        if playback.trim().is_empty() {
            return Err(PipelineError::Unplayable);
        }

        let patch = self.build_patch(item, &reference, &extracted);
        self.store.apply_metadata(item.id, &patch)?;

        if want_subtitles {
            self.store_subtitles(item.id).await?;
        }

        self.generate_visuals(item, options, &extracted, &playback)
            .await?;

        Ok(())
    }

    async fn extract(
        &self,
        reference: &str,
        kind: &RefKind,
        options: &RunOptions,
    ) -> ExtractionResult {
        let mut extracted = ExtractionResult::default();
        if options.extractor_override == ExtractorOverride::FallbackOnly {
            return extracted;
        }

        match kind {
            RefKind::LocalFile | RefKind::DirectFile => {}
            RefKind::SegmentedHost { .. } => {
                let result = self.segmented.attempt(reference).await;
                record_attempt(self.segmented.name(), &result);
                extracted.merge_from(result);
            }
            RefKind::Generic => {
                let result = self.host_strategy.attempt(reference).await;
                record_attempt(self.host_strategy.name(), &result);
                extracted.merge_from(result);

                if extracted.stream_url.is_none() {
                    let result = self.generic_strategy.attempt(reference).await;
                    record_attempt(self.generic_strategy.name(), &result);
                    extracted.merge_from(result);
                }
            }
        }

        extracted
    }

    async fn probe_fill(
        &self,
        extracted: &mut ExtractionResult,
        locator: Option<&str>,
        options: &RunOptions,
    ) {
        let needs_probe = extracted.duration_seconds.is_none()
            || extracted.width.is_none()
            || extracted.height.is_none();
        // Turbo accepts partial dimensions rather than paying for a probe.
        let turbo_satisfied =
            options.speed == SpeedProfile::Turbo && extracted.duration_seconds.is_some();
        if !needs_probe || turbo_satisfied {
            return;
        }

        let locator = match locator {
            Some(locator) => locator,
            None => return,
        };

        match self.probe.probe(locator).await {
            Ok(probed) => {
                if extracted.duration_seconds.is_none() {
                    extracted.duration_seconds = probed.duration_seconds;
                }
                if extracted.width.is_none() {
                    extracted.width = probed.width;
                }
                if extracted.height.is_none() {
                    extracted.height = probed.height;
                }
            }
            Err(e) => warn!(%locator, "probe failed: {e}"),
        }
    }

    fn build_patch(
        &self,
        item: &CatalogItem,
        reference: &str,
        extracted: &ExtractionResult,
    ) -> MetadataPatch {
        let real_title = extracted
            .title
            .clone()
            .filter(|t| !t.trim().is_empty() && !is_synthetic_title(t));
        let title = match real_title {
            Some(title) => Some(title),
            None if should_replace_title(&item.title) => Some(
                title_from_url(reference).unwrap_or_else(|| format!("Video #{}", item.id)),
            ),
            None => None,
        };

        let effective_title = title.as_deref().unwrap_or(&item.title);
        let tags = if !item.tags.trim().is_empty() {
            None
        } else if let Some(csv) = extracted.tags_csv.clone().filter(|t| !t.is_empty()) {
            Some(csv)
        } else {
            let matched = keyword_tags(effective_title, &self.config.keyword_tags);
            if matched.is_empty() {
                None
            } else {
                Some(matched.join(","))
            }
        };

        let ai_tags = if self.config.derive_ai_tags && item.ai_tags.trim().is_empty() {
            let derived =
                derive_content_tags(effective_title, extracted.description.as_deref(), 8);
            if derived.is_empty() {
                None
            } else {
                Some(derived.join(","))
            }
        } else {
            None
        };

        MetadataPatch {
            title,
            duration_seconds: extracted.duration_seconds,
            width: extracted.width,
            height: extracted.height,
            tags,
            ai_tags,
        }
    }

    async fn store_subtitles(&self, item_id: i64) -> Result<(), CatalogError> {
        let sidecar = self.fallback.subtitle_path(item_id);
        let raw = match tokio::fs::read_to_string(&sidecar).await {
            Ok(raw) => raw,
            Err(_) => return Ok(()),
        };
        let text = flatten_subtitles(&raw);
        if !text.is_empty() {
            self.store.set_subtitle(item_id, &text)?;
        }
        Ok(())
    }

    async fn generate_visuals(
        &self,
        item: &CatalogItem,
        options: &RunOptions,
        extracted: &ExtractionResult,
        playback: &str,
    ) -> Result<(), CatalogError> {
        if let Err(e) = tokio::fs::create_dir_all(&self.config.preview_dir).await {
            warn!("could not create preview dir: {e}");
            return Ok(());
        }

        let existing_thumb = item
            .thumbnail_path
            .as_deref()
            .filter(|p| Path::new(p).exists());
        if existing_thumb.is_some() && !options.force {
            return Ok(());
        }

        let preview_dir = self.config.preview_dir.trim_end_matches('/');
        let thumb_path = format!("{preview_dir}/{}.jpg", item.id);
        let duration = extracted.duration_seconds.unwrap_or(item.duration_seconds);

        let mut thumbnail_done = false;
        if let Some(url) = &extracted.thumbnail_url {
            let timeout = if options.speed == SpeedProfile::Turbo {
                self.config.turbo_thumbnail_timeout_secs
            } else {
                self.config.thumbnail_download_timeout_secs
            };
            thumbnail_done = self.download_thumbnail(url, &thumb_path, timeout).await;
        }

        // Turbo never runs the toolchain; a missing hosted thumbnail stays
        // missing.
        if options.speed != SpeedProfile::Turbo {
            if !thumbnail_done {
                match self
                    .probe
                    .generate_thumbnail(
                        playback,
                        extracted.duration_seconds,
                        Path::new(&thumb_path),
                    )
                    .await
                {
                    Ok(()) => thumbnail_done = true,
                    Err(e) => warn!(item_id = item.id, "thumbnail generation failed: {e}"),
                }
            }
        }

        let mut gif_path: Option<String> = None;
        if options.speed == SpeedProfile::Default && duration > 5.0 {
            let candidate = format!("{preview_dir}/{}.gif", item.id);
            match self
                .probe
                .generate_preview(playback, duration, Path::new(&candidate))
                .await
            {
                Ok(()) => gif_path = Some(candidate),
                Err(e) => warn!(item_id = item.id, "preview clip generation failed: {e}"),
            }
        }

        if thumbnail_done || gif_path.is_some() {
            self.store.set_visuals(
                item.id,
                thumbnail_done.then_some(thumb_path.as_str()),
                gif_path.as_deref(),
            )?;
        }

        Ok(())
    }

    async fn download_thumbnail(&self, url: &str, dest: &str, timeout_secs: u64) -> bool {
        let request = self
            .client
            .get(url)
            .timeout(Duration::from_secs(timeout_secs));
        let response = match request.send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!(%url, status = %resp.status(), "thumbnail download rejected");
                return false;
            }
            Err(e) => {
                warn!(%url, "thumbnail download failed: {e}");
                return false;
            }
        };

        let bytes = match response.bytes().await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return false,
            Err(e) => {
                warn!(%url, "thumbnail body read failed: {e}");
                return false;
            }
        };

        match tokio::fs::write(dest, &bytes).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%dest, "thumbnail write failed: {e}");
                false
            }
        }
    }
}

/// A ready item with a thumbnail that still exists on disk needs no rerun.
fn already_ingested(item: &CatalogItem) -> bool {
    item.status == ItemStatus::Ready
        && item
            .thumbnail_path
            .as_deref()
            .is_some_and(|p| Path::new(p).exists())
}

fn looks_like_media_file(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    MEDIA_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Whether the slow external tool should run, given what the cheap sources
/// already produced.
fn fallback_wanted(kind: &RefKind, extracted: &ExtractionResult, options: &RunOptions) -> bool {
    match options.extractor_override {
        ExtractorOverride::FallbackOnly => return true,
        ExtractorOverride::ProbeOnly => return false,
        ExtractorOverride::Auto => {}
    }
    if !matches!(kind, RefKind::Generic) {
        return false;
    }
    match options.speed {
        SpeedProfile::Turbo => false,
        SpeedProfile::Fast => extracted.title.is_none(),
        SpeedProfile::Default => !(extracted.title.is_some() && extracted.stream_url.is_some()),
    }
}

fn record_attempt(strategy: &str, result: &ExtractionResult) {
    let label = if result.is_empty() { "empty" } else { "hit" };
    EXTRACTION_ATTEMPTS
        .with_label_values(&[strategy, label])
        .inc();
}
