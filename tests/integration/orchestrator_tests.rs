//! End-to-end passes with fake scrapers, processors and sinks

use crate::common::{
    candidate, scheduler, source, EndlessSiteFactory, FailingProcessor, FixedScraper,
    LaunchFailingFactory, PassThroughProcessor, PoolScraper, RecordingSink,
};
use chrono::Utc;
use gleaner::orchestrator::{Orchestrator, PassMode};
use gleaner::scrape::{
    RenderSessionHandle, RenderedScraper, ScraperSet, Scraper, SessionFactory,
    UnavailableSessionFactory,
};
use gleaner::storage::{RunStatus, SqliteStorage, Storage};
use gleaner::{QueueStatus, SourceKind};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn open(dir: &TempDir) -> (SqliteStorage, PathBuf) {
    let path = dir.path().join("gleaner.db");
    (SqliteStorage::new(&path).unwrap(), path)
}

fn same_scraper(scraper: Arc<dyn Scraper>) -> ScraperSet {
    ScraperSet::new(scraper.clone(), scraper.clone(), scraper.clone(), scraper)
}

#[tokio::test]
async fn test_batch_splits_budget_across_sources() {
    let dir = TempDir::new().unwrap();
    let (storage, _) = open(&dir);
    let pool = Arc::new(PoolScraper::default());
    let sink = Arc::new(RecordingSink::default());

    let orchestrator = Orchestrator::new(
        storage,
        same_scraper(pool.clone()),
        Arc::new(PassThroughProcessor::default()),
        sink.clone(),
    )
    .with_scheduler(scheduler(10));
    orchestrator
        .sync_sources(&[
            source("landscapes", SourceKind::Unsplash, "landscape", None),
            source("earth", SourceKind::Reddit, "EarthPorn", None),
            source("blog", SourceKind::Url, "https://blog.test/post", None),
        ])
        .unwrap();

    let report = orchestrator.run_batch(None).await.unwrap().unwrap();

    assert_eq!(report.mode, PassMode::Batch);
    assert_eq!(report.visited, 3);
    assert_eq!(report.counters.uploaded, 12);
    assert_eq!(sink.count(), 12);

    // ceil(10 / 3) = 4 each, asked for twice that
    assert_eq!(*pool.limits.lock().unwrap(), vec![8, 8, 8]);

    let storage = orchestrator.storage();
    let storage = storage.lock().unwrap();
    for record in storage.enabled_sources().unwrap() {
        assert_eq!(record.total_scraped, 4, "source {}", record.name);
        assert!(record.last_scraped_at.is_some());
    }

    let runs = storage.recent_job_runs(1).unwrap();
    assert_eq!(runs[0].mode, "batch");
    assert_eq!(runs[0].status, RunStatus::Completed);
}

#[tokio::test]
async fn test_batch_size_override() {
    let dir = TempDir::new().unwrap();
    let (storage, _) = open(&dir);
    let pool = Arc::new(PoolScraper::default());

    let orchestrator = Orchestrator::new(
        storage,
        same_scraper(pool.clone()),
        Arc::new(PassThroughProcessor::default()),
        Arc::new(RecordingSink::default()),
    )
    .with_scheduler(scheduler(10));
    orchestrator
        .sync_sources(&[source("landscapes", SourceKind::Unsplash, "landscape", None)])
        .unwrap();

    let report = orchestrator.run_batch(Some(3)).await.unwrap().unwrap();
    assert_eq!(report.counters.uploaded, 3);
    assert_eq!(*pool.limits.lock().unwrap(), vec![6]);
}

#[tokio::test]
async fn test_ingested_images_are_not_posted_twice() {
    let dir = TempDir::new().unwrap();
    let (storage, _) = open(&dir);
    let fixed: Arc<dyn Scraper> = Arc::new(FixedScraper {
        images: vec![
            candidate("https://img.test/a.jpg", 2400, 1600, Some("Harbour lights at dusk")),
            candidate("https://img.test/b.jpg", 2400, 1600, Some("Harbour lights at dawn")),
        ],
    });
    let sink = Arc::new(RecordingSink::default());

    let orchestrator = Orchestrator::new(
        storage,
        same_scraper(fixed),
        Arc::new(PassThroughProcessor::default()),
        sink.clone(),
    )
    .with_scheduler(scheduler(4));
    orchestrator
        .sync_sources(&[source("harbour", SourceKind::Unsplash, "harbour", None)])
        .unwrap();

    let first = orchestrator.run_batch(None).await.unwrap().unwrap();
    assert_eq!(first.counters.uploaded, 2);

    let second = orchestrator.run_batch(None).await.unwrap().unwrap();
    assert_eq!(second.counters.uploaded, 0);
    assert_eq!(second.counters.scraped, 0);
    assert_eq!(sink.count(), 2);

    let storage = orchestrator.storage();
    assert_eq!(storage.lock().unwrap().count_ingested().unwrap(), 2);
}

#[tokio::test]
async fn test_failing_image_is_skipped_after_threshold() {
    let dir = TempDir::new().unwrap();
    let (storage, _) = open(&dir);
    let fixed: Arc<dyn Scraper> = Arc::new(FixedScraper {
        images: vec![candidate(
            "https://img.test/broken.jpg",
            2400,
            1600,
            Some("A broken photo link"),
        )],
    });
    let processor = Arc::new(FailingProcessor::default());

    let orchestrator = Orchestrator::new(
        storage,
        same_scraper(fixed),
        processor.clone(),
        Arc::new(RecordingSink::default()),
    )
    .with_scheduler(scheduler(1));
    orchestrator
        .sync_sources(&[source("broken", SourceKind::Unsplash, "broken", None)])
        .unwrap();

    for _ in 0..4 {
        orchestrator.run_batch(None).await.unwrap();
    }

    assert_eq!(processor.calls.load(Ordering::SeqCst), 3);

    let storage = orchestrator.storage();
    let storage = storage.lock().unwrap();
    assert!(storage.is_permanently_failed("https://img.test/broken.jpg").unwrap());
    assert_eq!(storage.count_ingested().unwrap(), 0);

    let today = storage.daily_stats(Utc::now().date_naive()).unwrap();
    assert_eq!(today.images_failed, 3);
}

#[tokio::test]
async fn test_filtered_candidate_is_recorded() {
    let dir = TempDir::new().unwrap();
    let (storage, _) = open(&dir);
    let fixed: Arc<dyn Scraper> = Arc::new(FixedScraper {
        images: vec![candidate("https://img.test/strip.jpg", 4000, 500, None)],
    });
    let processor = Arc::new(PassThroughProcessor::default());

    let orchestrator = Orchestrator::new(
        storage,
        same_scraper(fixed),
        processor.clone(),
        Arc::new(RecordingSink::default()),
    )
    .with_scheduler(scheduler(2));
    orchestrator
        .sync_sources(&[source("strips", SourceKind::Unsplash, "strip", None)])
        .unwrap();

    let report = orchestrator.run_batch(None).await.unwrap().unwrap();
    assert_eq!(report.counters.filtered, 1);
    assert_eq!(report.counters.uploaded, 0);
    assert_eq!(processor.calls.load(Ordering::SeqCst), 0);

    let storage = orchestrator.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_rejections().unwrap(), 1);
    let today = storage.daily_stats(Utc::now().date_naive()).unwrap();
    assert_eq!(today.quality_filtered, 1);
    assert_eq!(today.images_scraped, 1);
}

#[tokio::test]
async fn test_frontier_stops_at_depth_limit() {
    let dir = TempDir::new().unwrap();
    let (storage, path) = open(&dir);
    let factory = Arc::new(EndlessSiteFactory::default());
    let rendered: Arc<dyn Scraper> = Arc::new(RenderedScraper::new(
        Arc::new(RenderSessionHandle::new(factory.clone())),
        Duration::from_secs(5),
    ));
    let unused: Arc<dyn Scraper> = Arc::new(PoolScraper::default());
    let sink = Arc::new(RecordingSink::default());

    let orchestrator = Orchestrator::new(
        storage,
        ScraperSet::new(unused.clone(), unused.clone(), unused, rendered),
        Arc::new(PassThroughProcessor::default()),
        sink.clone(),
    )
    .with_scheduler(scheduler(5));
    orchestrator
        .sync_sources(&[source(
            "gallery",
            SourceKind::Url,
            "https://gallery.test/",
            Some(1),
        )])
        .unwrap();

    let mut passes = 0;
    loop {
        let report = orchestrator.run_frontier().await.unwrap().unwrap();
        passes += 1;
        if report.visited == 0 || passes > 5 {
            break;
        }
    }
    // seed, its two children, then an empty pass
    assert_eq!(passes, 3);

    {
        let storage = orchestrator.storage();
        let storage = storage.lock().unwrap();
        let counts = storage.frontier_counts().unwrap();
        assert_eq!(counts.get(&QueueStatus::Completed), Some(&3));
        assert!(storage.dequeue_batch(10).unwrap().is_empty());
    }

    let conn = rusqlite::Connection::open(&path).unwrap();
    let max_depth: i64 = conn
        .query_row("SELECT MAX(depth) FROM crawl_queue", [], |row| row.get(0))
        .unwrap();
    assert_eq!(max_depth, 1);

    // one photo per visited page, one session for the whole crawl
    assert_eq!(sink.count(), 3);
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);

    orchestrator.shutdown().await;
}

/// Orchestrator whose rendered strategy is built on `factory`
fn crawl_orchestrator(storage: SqliteStorage, factory: Arc<dyn SessionFactory>) -> Orchestrator {
    let rendered: Arc<dyn Scraper> = Arc::new(RenderedScraper::new(
        Arc::new(RenderSessionHandle::new(factory)),
        Duration::from_secs(5),
    ));
    let unused: Arc<dyn Scraper> = Arc::new(PoolScraper::default());
    Orchestrator::new(
        storage,
        ScraperSet::new(unused.clone(), unused.clone(), unused, rendered),
        Arc::new(PassThroughProcessor::default()),
        Arc::new(RecordingSink::default()),
    )
    .with_scheduler(scheduler(5))
}

fn pending_and_failed(orchestrator: &Orchestrator) -> (u64, u64) {
    let storage = orchestrator.storage();
    let counts = storage.lock().unwrap().frontier_counts().unwrap();
    (
        counts[&QueueStatus::Pending],
        counts[&QueueStatus::Failed],
    )
}

#[tokio::test]
async fn test_missing_renderer_leaves_seed_pending() {
    let dir = TempDir::new().unwrap();
    let (storage, _) = open(&dir);
    let orchestrator = crawl_orchestrator(storage, Arc::new(UnavailableSessionFactory));
    orchestrator
        .sync_sources(&[source("gallery", SourceKind::Url, "https://gallery.test/", Some(1))])
        .unwrap();

    for _ in 0..2 {
        let report = orchestrator.run_frontier().await.unwrap().unwrap();
        assert_eq!(report.visited, 0);
    }

    assert_eq!(pending_and_failed(&orchestrator), (1, 0));
}

#[tokio::test]
async fn test_renderer_launch_failure_leaves_items_pending() {
    let dir = TempDir::new().unwrap();
    let (storage, _) = open(&dir);
    let factory = Arc::new(LaunchFailingFactory::default());
    let orchestrator = crawl_orchestrator(storage, factory.clone());
    orchestrator
        .sync_sources(&[
            source("gallery", SourceKind::Url, "https://gallery.test/", Some(1)),
            source("archive", SourceKind::Url, "https://archive.test/", Some(1)),
        ])
        .unwrap();

    let report = orchestrator.run_frontier().await.unwrap().unwrap();
    assert_eq!(report.visited, 0);

    // The pass stops at the first launch failure
    assert_eq!(factory.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(pending_and_failed(&orchestrator), (2, 0));
}

#[tokio::test]
async fn test_disabled_source_items_stay_pending() {
    let dir = TempDir::new().unwrap();
    let (storage, _) = open(&dir);
    let factory = Arc::new(EndlessSiteFactory::default());
    let orchestrator = crawl_orchestrator(storage, factory.clone());
    orchestrator
        .sync_sources(&[source("gallery", SourceKind::Url, "https://gallery.test/", Some(1))])
        .unwrap();
    orchestrator.seed_frontier().unwrap();

    // Dropped from configuration
    orchestrator.sync_sources(&[]).unwrap();
    let report = orchestrator.run_frontier().await.unwrap().unwrap();
    assert_eq!(report.visited, 0);
    assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    assert_eq!(pending_and_failed(&orchestrator), (1, 0));

    // Back in configuration, the seed is crawled
    orchestrator
        .sync_sources(&[source("gallery", SourceKind::Url, "https://gallery.test/", Some(0))])
        .unwrap();
    let report = orchestrator.run_frontier().await.unwrap().unwrap();
    assert_eq!(report.visited, 1);
    assert_eq!(pending_and_failed(&orchestrator), (0, 0));
}

#[tokio::test]
async fn test_overlapping_pass_is_skipped() {
    let dir = TempDir::new().unwrap();
    let (storage, _) = open(&dir);
    let pool = Arc::new(PoolScraper::default());

    let orchestrator = Orchestrator::new(
        storage,
        same_scraper(pool.clone()),
        Arc::new(PassThroughProcessor::default()),
        Arc::new(RecordingSink::default()),
    );
    orchestrator
        .sync_sources(&[source("landscapes", SourceKind::Unsplash, "landscape", None)])
        .unwrap();

    let permit = orchestrator.guard().try_acquire().unwrap();
    assert!(orchestrator.run_batch(None).await.unwrap().is_none());
    assert!(orchestrator.run_frontier().await.unwrap().is_none());
    assert!(pool.limits.lock().unwrap().is_empty());

    drop(permit);
    assert!(orchestrator.run_batch(None).await.unwrap().is_some());
}

#[tokio::test]
async fn test_shutdown_interrupts_unfinished_runs() {
    let dir = TempDir::new().unwrap();
    let (mut storage, _) = open(&dir);
    storage.create_job_run("crawl", "abc").unwrap();

    let pool: Arc<dyn Scraper> = Arc::new(PoolScraper::default());
    let orchestrator = Orchestrator::new(
        storage,
        same_scraper(pool),
        Arc::new(PassThroughProcessor::default()),
        Arc::new(RecordingSink::default()),
    );
    orchestrator.shutdown().await;

    let storage = orchestrator.storage();
    let runs = storage.lock().unwrap().recent_job_runs(1).unwrap();
    assert_eq!(runs[0].status, RunStatus::Interrupted);
    assert!(runs[0].finished_at.is_some());
}
