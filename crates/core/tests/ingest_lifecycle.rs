//! Ingestion lifecycle integration tests.
//!
//! These tests drive the full pipeline against an in-memory catalog with
//! mock extraction sources and a mock probe:
//! - Terminal state transitions (ready / error)
//! - Result merging across sources in priority order
//! - Idempotence and forced reruns
//! - Speed profile gating of the fallback tool, subtitles and previews
//! - Batch isolation

use std::sync::Arc;

use tempfile::TempDir;

use streamvault_core::{
    catalog::{ItemStatus, ItemStore, NewItem, SqliteStore},
    extractor::{
        ExtractionResult, ExtractionStrategy, FallbackExtractor, SegmentedHostClient,
        SegmentedHostConfig,
    },
    pipeline::{
        ExtractorOverride, IngestPipeline, PipelineConfig, RunOptions, RunOutcome, SpeedProfile,
    },
    status::{StatusBroadcaster, StatusUpdate},
    testing::{fixtures, MockFallback, MockProbe, MockStrategy},
};

/// Test helper wiring the pipeline to mocks and a throwaway catalog.
struct TestHarness {
    pipeline: Arc<IngestPipeline>,
    store: Arc<SqliteStore>,
    host: Arc<MockStrategy>,
    generic: Arc<MockStrategy>,
    fallback: Arc<MockFallback>,
    probe: Arc<MockProbe>,
    broadcaster: StatusBroadcaster,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(SqliteStore::in_memory().expect("Failed to open catalog"));
        let host = Arc::new(MockStrategy::new("host"));
        let generic = Arc::new(MockStrategy::new("generic"));
        let fallback = Arc::new(MockFallback::with_subtitle_dir(temp_dir.path()));
        let probe = Arc::new(MockProbe::new());
        let broadcaster = StatusBroadcaster::default();

        // Loopback port 1 refuses connections immediately, so segmented-host
        // lookups fail fast instead of reaching the network.
        let segmented = Arc::new(SegmentedHostClient::new(
            reqwest::Client::new(),
            SegmentedHostConfig {
                base_url: "http://127.0.0.1:1".to_string(),
            },
        ));

        let config = PipelineConfig {
            preview_dir: temp_dir.path().join("previews").display().to_string(),
            ..Default::default()
        };

        let pipeline = Arc::new(IngestPipeline::new(
            store.clone(),
            host.clone() as Arc<dyn ExtractionStrategy>,
            generic.clone() as Arc<dyn ExtractionStrategy>,
            segmented,
            fallback.clone(),
            probe.clone(),
            broadcaster.clone(),
            reqwest::Client::new(),
            config,
        ));

        Self {
            pipeline,
            store,
            host,
            generic,
            fallback,
            probe,
            broadcaster,
            _temp_dir: temp_dir,
        }
    }

    fn insert_remote(&self, source_url: &str) -> i64 {
        self.store
            .insert(fixtures::remote_item(source_url))
            .expect("Failed to insert item")
    }
}

fn options(speed: SpeedProfile) -> RunOptions {
    RunOptions {
        force: false,
        speed,
        extractor_override: ExtractorOverride::Auto,
    }
}

#[tokio::test]
async fn test_successful_ingest_ends_ready() {
    let harness = TestHarness::new();
    let id = harness.insert_remote("https://site.example/watch/1");

    harness
        .generic
        .set_result(fixtures::scraped_result(
            "Great Clip",
            "https://cdn.example/clip.m3u8",
        ))
        .await;

    let outcome = harness
        .pipeline
        .run(id, options(SpeedProfile::Default))
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    let item = harness.store.get(id).unwrap();
    assert_eq!(item.status, ItemStatus::Ready);
    assert_eq!(item.title, "Great Clip");
    assert_eq!(item.playback_url, "https://cdn.example/clip.m3u8");
    assert_eq!(item.duration_seconds, 120.0);
    assert!(item.error_message.is_none());
    assert!(item.thumbnail_path.is_some());

    // Scrapers resolved title and stream, so the slow tool stayed idle.
    assert_eq!(harness.fallback.extraction_count().await, 0);
}

#[tokio::test]
async fn test_unresolvable_item_ends_error() {
    let harness = TestHarness::new();
    let id = harness.insert_remote("https://site.example/watch/broken");

    let outcome = harness
        .pipeline
        .run(id, options(SpeedProfile::Default))
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Failed { .. }));

    let item = harness.store.get(id).unwrap();
    assert_eq!(item.status, ItemStatus::Error);
    assert_eq!(
        item.error_message.as_deref(),
        Some("no playable stream resolved")
    );
}

#[tokio::test]
async fn test_merge_keeps_higher_priority_fields() {
    let harness = TestHarness::new();
    let id = harness.insert_remote("https://site.example/watch/2");

    harness
        .host
        .set_result(ExtractionResult {
            title: Some("Host Title".to_string()),
            ..Default::default()
        })
        .await;
    harness
        .generic
        .set_result(fixtures::scraped_result(
            "Generic Title",
            "https://cdn.example/v.mp4",
        ))
        .await;

    harness
        .pipeline
        .run(id, options(SpeedProfile::Default))
        .await
        .unwrap();

    let item = harness.store.get(id).unwrap();
    assert_eq!(item.title, "Host Title");
    assert_eq!(item.playback_url, "https://cdn.example/v.mp4");
}

#[tokio::test]
async fn test_ready_item_with_thumbnail_is_skipped() {
    let harness = TestHarness::new();
    let id = harness.insert_remote("https://site.example/watch/3");

    harness
        .generic
        .set_result(fixtures::scraped_result("T", "https://cdn.example/v.mp4"))
        .await;
    harness
        .pipeline
        .run(id, options(SpeedProfile::Default))
        .await
        .unwrap();
    let attempts_after_first = harness.generic.attempt_count().await;

    let outcome = harness
        .pipeline
        .run(id, options(SpeedProfile::Default))
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Skipped);
    assert_eq!(harness.generic.attempt_count().await, attempts_after_first);
}

#[tokio::test]
async fn test_force_reruns_ready_item() {
    let harness = TestHarness::new();
    let id = harness.insert_remote("https://site.example/watch/4");

    harness
        .generic
        .set_result(fixtures::scraped_result("T", "https://cdn.example/v.mp4"))
        .await;
    harness
        .pipeline
        .run(id, options(SpeedProfile::Default))
        .await
        .unwrap();
    let attempts_after_first = harness.generic.attempt_count().await;

    let forced = RunOptions {
        force: true,
        ..options(SpeedProfile::Default)
    };
    let outcome = harness.pipeline.run(id, forced).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed);
    assert!(harness.generic.attempt_count().await > attempts_after_first);
}

#[tokio::test]
async fn test_turbo_skips_fallback_and_visual_generation() {
    let harness = TestHarness::new();
    let id = harness.insert_remote("https://site.example/watch/5");

    harness
        .generic
        .set_result(fixtures::scraped_result("T", "https://cdn.example/v.mp4"))
        .await;

    let outcome = harness
        .pipeline
        .run(id, options(SpeedProfile::Turbo))
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    assert_eq!(harness.fallback.extraction_count().await, 0);
    assert!(harness.probe.recorded_thumbnails().await.is_empty());
    assert!(harness.probe.recorded_previews().await.is_empty());
}

#[tokio::test]
async fn test_fast_uses_fallback_only_without_title() {
    let harness = TestHarness::new();

    // Title already scraped: no fallback.
    let titled = harness.insert_remote("https://site.example/watch/6");
    harness
        .generic
        .set_result(fixtures::scraped_result("T", "https://cdn.example/v.mp4"))
        .await;
    harness
        .pipeline
        .run(titled, options(SpeedProfile::Fast))
        .await
        .unwrap();
    assert_eq!(harness.fallback.extraction_count().await, 0);

    // No title from scrapers: fallback runs, but without subtitles.
    let untitled = harness.insert_remote("https://site.example/watch/7");
    harness
        .generic
        .set_result(ExtractionResult {
            stream_url: Some("https://cdn.example/v2.mp4".to_string()),
            ..Default::default()
        })
        .await;
    harness
        .fallback
        .set_result(fixtures::scraped_result(
            "Resolved",
            "https://cdn.example/v2.mp4",
        ))
        .await;
    harness
        .pipeline
        .run(untitled, options(SpeedProfile::Fast))
        .await
        .unwrap();

    let calls = harness.fallback.recorded_extractions().await;
    assert_eq!(calls.len(), 1);
    assert!(!calls[0].want_subtitles);
    assert_eq!(harness.store.get(untitled).unwrap().title, "Resolved");

    // Fast never cuts a preview clip.
    assert!(harness.probe.recorded_previews().await.is_empty());
}

#[tokio::test]
async fn test_default_profile_stores_flattened_subtitles() {
    let harness = TestHarness::new();
    let id = harness.insert_remote("https://site.example/watch/8");

    harness
        .fallback
        .set_result(fixtures::scraped_result(
            "Spoken",
            "https://cdn.example/v.mp4",
        ))
        .await;

    // Sidecar the fallback tool would have written.
    let sidecar = harness.fallback.subtitle_path(id);
    tokio::fs::write(
        &sidecar,
        "WEBVTT\n\n1\n00:00:01.000 --> 00:00:03.000\nHello world\n\n2\n00:00:03.000 --> 00:00:05.000\nGoodbye\n",
    )
    .await
    .unwrap();

    harness
        .pipeline
        .run(id, options(SpeedProfile::Default))
        .await
        .unwrap();

    let calls = harness.fallback.recorded_extractions().await;
    assert_eq!(calls.len(), 1);
    assert!(calls[0].want_subtitles);

    let item = harness.store.get(id).unwrap();
    assert_eq!(item.subtitle_text.as_deref(), Some("Hello world Goodbye"));
}

#[tokio::test]
async fn test_direct_file_skips_scrapers_and_probes_metadata() {
    let harness = TestHarness::new();
    let id = harness
        .store
        .insert(NewItem {
            playback_url: "https://cdn.example/direct/clip.mp4".to_string(),
            source_url: Some("https://cdn.example/direct/clip.mp4".to_string()),
            title: Some("Direct".to_string()),
            batch_label: None,
        })
        .unwrap();

    let outcome = harness
        .pipeline
        .run(id, options(SpeedProfile::Default))
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Completed);

    assert_eq!(harness.host.attempt_count().await, 0);
    assert_eq!(harness.generic.attempt_count().await, 0);
    assert_eq!(harness.fallback.extraction_count().await, 0);

    // Dimensions and duration came from the probe.
    let item = harness.store.get(id).unwrap();
    assert_eq!(item.width, 1920);
    assert_eq!(item.height, 1080);
    assert_eq!(item.duration_seconds, 60.0);

    // Long enough for a preview clip under the default profile.
    assert_eq!(harness.probe.recorded_previews().await.len(), 1);
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    let harness = TestHarness::new();
    let good = harness
        .store
        .insert(fixtures::direct_item(
            "https://cdn.example/ok.mp4",
            "Good Item",
        ))
        .unwrap();
    let bad = harness.insert_remote("https://site.example/watch/broken");

    let outcomes = harness
        .pipeline
        .run_batch(&[good, bad], options(SpeedProfile::Default))
        .await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0], (good, RunOutcome::Completed));
    assert!(matches!(outcomes[1].1, RunOutcome::Failed { .. }));

    assert_eq!(harness.store.get(good).unwrap().status, ItemStatus::Ready);
    assert_eq!(harness.store.get(bad).unwrap().status, ItemStatus::Error);
}

#[tokio::test]
async fn test_run_broadcasts_processing_then_ready() {
    let harness = TestHarness::new();
    let id = harness.insert_remote("https://site.example/watch/9");

    harness
        .generic
        .set_result(fixtures::scraped_result("T", "https://cdn.example/v.mp4"))
        .await;

    let mut rx = harness.broadcaster.subscribe();
    harness
        .pipeline
        .run(id, options(SpeedProfile::Default))
        .await
        .unwrap();

    let first = rx.recv().await.unwrap();
    assert!(matches!(
        first,
        StatusUpdate::ItemUpdate {
            item_id,
            status: ItemStatus::Processing,
            ..
        } if item_id == id
    ));

    let second = rx.recv().await.unwrap();
    assert!(matches!(
        second,
        StatusUpdate::ItemUpdate {
            item_id,
            status: ItemStatus::Ready,
            ..
        } if item_id == id
    ));
}
