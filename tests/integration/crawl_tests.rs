//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small paginated catalog and run the full
//! crawl cycle end-to-end against an on-disk database.

mod common;

use chrono::Utc;
use common::{listing_url, item_url, sample_catalog, test_config};
use shelfwatch::crawler::{Coordinator, CrawlMode, STOPPED_REASON};
use shelfwatch::state::{CrawlCursor, CrawlState, RunStatus};
use shelfwatch::storage::{self, open_storage, Storage};
use std::time::Duration;
use wiremock::MockServer;

#[tokio::test]
async fn test_full_crawl_completes() {
    let server = MockServer::start().await;
    let catalog = sample_catalog();
    catalog.mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let storage = open_storage(&config.output.database_path).unwrap();
    let coordinator = Coordinator::new(config, storage.clone()).unwrap();

    let report = coordinator.run(CrawlMode::Resume).await.unwrap();

    assert!(!report.resumed);
    assert_eq!(report.state.status, RunStatus::Completed);
    assert_eq!(report.state.cursor, None);

    let counters = report.state.counters;
    assert_eq!(counters.pages_processed, 3);
    assert_eq!(counters.pages_failed, 0);
    assert_eq!(counters.items_processed, 5);
    assert_eq!(counters.items_new, 5);
    assert_eq!(counters.items_skipped(), 0);

    let s = storage::lock(&storage).unwrap();
    assert_eq!(s.count_items().unwrap(), catalog.item_count());

    let record = s
        .get_item(&item_url(&server, "a-walk-in-the-woods"))
        .unwrap()
        .unwrap();
    assert_eq!(record.category, "Travel");
    assert_eq!(record.price_incl_tax.to_string(), "10.00");
    assert_eq!(record.availability, "In stock (5 available)");
    assert_eq!(record.rating, 4);

    let saved = s.load_crawl_state().unwrap();
    assert_eq!(saved.status, RunStatus::Completed);
    assert_eq!(saved.counters, counters);
}

#[tokio::test]
async fn test_recrawl_is_idempotent() {
    let server = MockServer::start().await;
    sample_catalog().mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let storage = open_storage(&config.output.database_path).unwrap();
    let coordinator = Coordinator::new(config, storage.clone()).unwrap();

    coordinator.run(CrawlMode::Resume).await.unwrap();
    let pending_after_first = storage::lock(&storage)
        .unwrap()
        .count_pending_detections()
        .unwrap();

    let second = coordinator.run(CrawlMode::Resume).await.unwrap();

    let counters = second.state.counters;
    assert_eq!(second.state.status, RunStatus::Completed);
    assert_eq!(counters.items_new, 0);
    assert_eq!(counters.items_updated, 0);
    assert_eq!(counters.items_unchanged, 5);

    let s = storage::lock(&storage).unwrap();
    assert_eq!(s.count_items().unwrap(), 5);
    assert_eq!(s.count_pending_detections().unwrap(), pending_after_first);
}

#[tokio::test]
async fn test_resume_continues_from_checkpoint() {
    let server = MockServer::start().await;
    sample_catalog().mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let storage = open_storage(&config.output.database_path).unwrap();

    // An earlier run was interrupted after finishing the Travel category
    let mut interrupted = CrawlState::begin(Utc::now());
    interrupted.counters.pages_processed = 2;
    interrupted.counters.items_processed = 3;
    interrupted.advance_to(CrawlCursor {
        category: "Mystery".to_string(),
        page: 1,
        page_url: listing_url(&server, "mystery", 1),
    });
    storage::lock(&storage)
        .unwrap()
        .save_crawl_state(&interrupted)
        .unwrap();

    let coordinator = Coordinator::new(config, storage.clone()).unwrap();
    let report = coordinator.run(CrawlMode::Resume).await.unwrap();

    assert!(report.resumed);
    assert_eq!(report.state.status, RunStatus::Completed);
    assert_eq!(report.state.counters.pages_processed, 3);
    assert_eq!(report.state.counters.items_processed, 5);

    // Only the Mystery items were fetched
    assert_eq!(storage::lock(&storage).unwrap().count_items().unwrap(), 2);
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| !r.url.path().contains("travel")));
}

#[tokio::test]
async fn test_fresh_mode_ignores_checkpoint() {
    let server = MockServer::start().await;
    sample_catalog().mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let storage = open_storage(&config.output.database_path).unwrap();

    let mut interrupted = CrawlState::begin(Utc::now());
    interrupted.advance_to(CrawlCursor {
        category: "Mystery".to_string(),
        page: 1,
        page_url: listing_url(&server, "mystery", 1),
    });
    storage::lock(&storage)
        .unwrap()
        .save_crawl_state(&interrupted)
        .unwrap();

    let coordinator = Coordinator::new(config, storage.clone()).unwrap();
    let report = coordinator.run(CrawlMode::Fresh).await.unwrap();

    assert!(!report.resumed);
    assert_eq!(report.state.counters.items_processed, 5);
    assert_eq!(storage::lock(&storage).unwrap().count_items().unwrap(), 5);
}

#[tokio::test]
async fn test_item_fetch_failure_is_skipped() {
    let server = MockServer::start().await;
    let mut catalog = sample_catalog();
    catalog.item_mut("vagabonding").broken = true;
    catalog.mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let storage = open_storage(&config.output.database_path).unwrap();
    let coordinator = Coordinator::new(config, storage.clone()).unwrap();

    let report = coordinator.run(CrawlMode::Resume).await.unwrap();

    assert_eq!(report.state.status, RunStatus::Completed);
    assert_eq!(report.state.counters.fetch_failures, 1);
    assert_eq!(report.state.counters.items_skipped(), 1);
    assert_eq!(report.state.counters.items_processed, 4);

    let s = storage::lock(&storage).unwrap();
    assert_eq!(s.count_items().unwrap(), 4);
    assert!(s
        .get_item(&item_url(&server, "vagabonding"))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_failed_listing_abandons_category() {
    let server = MockServer::start().await;
    let mut catalog = sample_catalog();
    catalog.categories[0].broken = true;
    catalog.mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let storage = open_storage(&config.output.database_path).unwrap();
    let coordinator = Coordinator::new(config, storage.clone()).unwrap();

    let report = coordinator.run(CrawlMode::Resume).await.unwrap();

    assert_eq!(report.state.status, RunStatus::Completed);
    assert_eq!(report.state.counters.pages_failed, 1);
    assert_eq!(report.state.counters.pages_processed, 1);
    assert_eq!(storage::lock(&storage).unwrap().count_items().unwrap(), 2);
}

#[tokio::test]
async fn test_unreachable_root_fails_run() {
    let server = MockServer::start().await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let storage = open_storage(&config.output.database_path).unwrap();
    let coordinator = Coordinator::new(config, storage.clone()).unwrap();

    assert!(coordinator.run(CrawlMode::Resume).await.is_err());

    let saved = storage::lock(&storage).unwrap().load_crawl_state().unwrap();
    assert_eq!(saved.status, RunStatus::Failed);
    assert!(saved.last_error.is_some());
}

#[tokio::test]
async fn test_store_failure_fails_run_on_current_page() {
    let server = MockServer::start().await;
    sample_catalog().mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let storage = open_storage(&config.output.database_path).unwrap();

    // A second connection makes the database refuse one item on Travel page 2
    let conn = rusqlite::Connection::open(&config.output.database_path).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_item BEFORE INSERT ON items
         WHEN NEW.url LIKE '%vagabonding%'
         BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
    )
    .unwrap();
    drop(conn);

    let coordinator = Coordinator::new(config, storage.clone()).unwrap();
    assert!(coordinator.run(CrawlMode::Resume).await.is_err());

    let s = storage::lock(&storage).unwrap();
    let saved = s.load_crawl_state().unwrap();
    assert_eq!(saved.status, RunStatus::Failed);
    assert!(saved.last_error.is_some());
    assert_eq!(saved.counters.store_failures, 1);
    assert_eq!(saved.counters.pages_processed, 1);

    let cursor = saved.cursor.unwrap();
    assert_eq!(cursor.category, "Travel");
    assert_eq!(cursor.page, 2);
    assert_eq!(cursor.page_url, listing_url(&server, "travel", 2));

    assert_eq!(s.count_items().unwrap(), 2);
    assert!(s
        .get_item(&item_url(&server, "vagabonding"))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_interrupted_run_resumes_to_same_item_set() {
    let server = MockServer::start().await;
    let mut catalog = sample_catalog();
    catalog.slow_listing = Some(("travel".to_string(), 2, Duration::from_secs(10)));
    catalog.mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let storage = open_storage(&config.output.database_path).unwrap();

    // The first run is dropped mid-flight while waiting on Travel page 2
    {
        let coordinator = Coordinator::new(config.clone(), storage.clone()).unwrap();
        let interrupted =
            tokio::time::timeout(Duration::from_secs(2), coordinator.run(CrawlMode::Resume)).await;
        assert!(interrupted.is_err());
    }

    {
        let s = storage::lock(&storage).unwrap();
        let saved = s.load_crawl_state().unwrap();
        assert_eq!(saved.status, RunStatus::InProgress);
        assert_eq!(saved.counters.items_processed, 2);
        let cursor = saved.cursor.unwrap();
        assert_eq!(cursor.category, "Travel");
        assert_eq!(cursor.page, 2);
        assert_eq!(s.count_items().unwrap(), 2);
    }

    catalog.slow_listing = None;
    catalog.remount(&server).await;

    let coordinator = Coordinator::new(config, storage.clone()).unwrap();
    let report = coordinator.run(CrawlMode::Resume).await.unwrap();

    assert!(report.resumed);
    assert_eq!(report.state.status, RunStatus::Completed);
    assert_eq!(report.state.counters.pages_processed, 3);
    assert_eq!(report.state.counters.items_processed, 5);
    assert_eq!(report.state.counters.items_new, 5);

    let s = storage::lock(&storage).unwrap();
    assert_eq!(s.count_items().unwrap(), catalog.item_count());
    for slug in [
        "a-walk-in-the-woods",
        "full-moon-over-noahs-ark",
        "vagabonding",
        "sharp-objects",
        "in-a-dark-dark-wood",
    ] {
        assert!(s.get_item(&item_url(&server, slug)).unwrap().is_some(), "{}", slug);
    }
}

#[tokio::test]
async fn test_stop_signal_halts_and_next_run_starts_fresh() {
    let server = MockServer::start().await;
    sample_catalog().mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let storage = open_storage(&config.output.database_path).unwrap();
    let coordinator = Coordinator::new(config, storage.clone()).unwrap();

    let stop = coordinator.stop_signal();
    stop.request_stop();
    let stopped = coordinator.run(CrawlMode::Resume).await.unwrap();

    assert!(stopped.was_stopped());
    assert_eq!(stopped.state.status, RunStatus::Failed);
    assert_eq!(stopped.state.last_error.as_deref(), Some(STOPPED_REASON));
    let cursor = stopped.state.cursor.clone().unwrap();
    assert_eq!(cursor.category, "Travel");
    assert_eq!(cursor.page, 1);
    assert_eq!(storage::lock(&storage).unwrap().count_items().unwrap(), 0);

    stop.reset();
    let next = coordinator.run(CrawlMode::Resume).await.unwrap();

    assert!(!next.resumed);
    assert_eq!(next.state.status, RunStatus::Completed);
    assert_eq!(storage::lock(&storage).unwrap().count_items().unwrap(), 5);
}
