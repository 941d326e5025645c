//! Integration tests for change detection and the scheduler trigger
//!
//! Each test crawls a wiremock catalog, mutates it, crawls again and checks what
//! the detection pass records.

mod common;

use chrono::Utc;
use common::{item, item_url, sample_catalog, test_config};
use shelfwatch::catalog::{CatalogRecord, ChangeKind, ChangeValue, ItemFields, Price};
use shelfwatch::crawler::CrawlMode;
use shelfwatch::output::write_change_reports;
use shelfwatch::storage::{self, open_storage, ChangeQuery, SharedStorage, Storage, UpsertOutcome};
use shelfwatch::Trigger;
use std::time::Duration;
use wiremock::MockServer;

fn changes(storage: &SharedStorage, kind: Option<ChangeKind>) -> Vec<shelfwatch::Change> {
    storage::lock(storage)
        .unwrap()
        .list_changes(&ChangeQuery {
            kind,
            ..ChangeQuery::default()
        })
        .unwrap()
}

/// Crawls once and drains the initial new-item changes
async fn baseline(server: &MockServer, dir: &std::path::Path) -> Trigger {
    let config = test_config(server, dir);
    let storage = open_storage(&config.output.database_path).unwrap();
    let trigger = Trigger::from_config(config, storage).unwrap();

    trigger.trigger_crawl(CrawlMode::Resume).await.unwrap().unwrap();
    let first = trigger.trigger_change_detection().await.unwrap().unwrap();
    assert_eq!(first.changes_found, 5);
    assert_eq!(first.items_scanned, 5);

    trigger
}

#[tokio::test]
async fn test_first_pass_reports_new_items() {
    let server = MockServer::start().await;
    sample_catalog().mount(&server).await;
    let dir = tempfile::tempdir().unwrap();

    let trigger = baseline(&server, dir.path()).await;

    let new_items = changes(trigger.storage(), Some(ChangeKind::NewItem));
    assert_eq!(new_items.len(), 5);
    assert!(new_items.iter().all(|c| c.prior.is_none()));
    assert_eq!(
        storage::lock(trigger.storage())
            .unwrap()
            .count_pending_detections()
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_unchanged_recrawl_reports_nothing() {
    let server = MockServer::start().await;
    sample_catalog().mount(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let trigger = baseline(&server, dir.path()).await;

    trigger.trigger_crawl(CrawlMode::Resume).await.unwrap().unwrap();
    let summary = trigger.trigger_change_detection().await.unwrap().unwrap();

    assert_eq!(summary.items_scanned, 0);
    assert_eq!(summary.changes_found, 0);
    assert_eq!(changes(trigger.storage(), None).len(), 5);
}

#[tokio::test]
async fn test_price_change_is_recorded_once() {
    let server = MockServer::start().await;
    let mut catalog = sample_catalog();
    catalog.mount(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let trigger = baseline(&server, dir.path()).await;

    catalog.item_mut("a-walk-in-the-woods").price = "£12.00".to_string();
    catalog.remount(&server).await;

    let report = trigger.trigger_crawl(CrawlMode::Resume).await.unwrap().unwrap();
    assert_eq!(report.state.counters.items_updated, 1);
    assert_eq!(report.state.counters.items_unchanged, 4);

    let summary = trigger.trigger_change_detection().await.unwrap().unwrap();
    assert_eq!(summary.changes_found, 1);
    assert_eq!(summary.items_scanned, 1);

    let price_changes = changes(trigger.storage(), Some(ChangeKind::PriceChange));
    assert_eq!(price_changes.len(), 1);
    let change = &price_changes[0];
    assert_eq!(change.item_url, item_url(&server, "a-walk-in-the-woods"));
    assert_eq!(change.prior, Some(ChangeValue::Price(Price::from_minor_units(1000))));
    assert_eq!(change.new, ChangeValue::Price(Price::from_minor_units(1200)));
    assert_eq!(change.run_id, summary.run_id);

    let again = trigger.trigger_change_detection().await.unwrap().unwrap();
    assert_eq!(again.changes_found, 0);
}

#[tokio::test]
async fn test_price_and_availability_change_are_separate_records() {
    let server = MockServer::start().await;
    let mut catalog = sample_catalog();
    catalog.mount(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let trigger = baseline(&server, dir.path()).await;

    let changed = catalog.item_mut("sharp-objects");
    changed.price = "£39.99".to_string();
    changed.availability = "Out of stock".to_string();
    catalog.remount(&server).await;

    trigger.trigger_crawl(CrawlMode::Resume).await.unwrap().unwrap();
    let summary = trigger.trigger_change_detection().await.unwrap().unwrap();
    assert_eq!(summary.changes_found, 2);

    let availability = changes(trigger.storage(), Some(ChangeKind::AvailabilityChange));
    assert_eq!(availability.len(), 1);
    assert_eq!(
        availability[0].prior,
        Some(ChangeValue::Availability("In stock (20 available)".to_string()))
    );
    assert_eq!(
        availability[0].new,
        ChangeValue::Availability("Out of stock".to_string())
    );
    assert_eq!(
        changes(trigger.storage(), Some(ChangeKind::PriceChange)).len(),
        1
    );
}

#[tokio::test]
async fn test_new_listing_is_reported_as_new_item() {
    let server = MockServer::start().await;
    let mut catalog = sample_catalog();
    catalog.mount(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let trigger = baseline(&server, dir.path()).await;

    catalog.categories[1].pages[0].push(item("the-past-never-ends", "£56.50", "In stock (2 available)"));
    catalog.remount(&server).await;

    trigger.trigger_crawl(CrawlMode::Resume).await.unwrap().unwrap();
    let summary = trigger.trigger_change_detection().await.unwrap().unwrap();
    assert_eq!(summary.changes_found, 1);

    let newest = &changes(trigger.storage(), None)[0];
    assert_eq!(newest.kind, ChangeKind::NewItem);
    assert_eq!(newest.item_url, item_url(&server, "the-past-never-ends"));
    match &newest.new {
        ChangeValue::Item(summary) => {
            assert_eq!(summary.category, "Mystery");
            assert_eq!(summary.price, Price::from_minor_units(5650));
        }
        other => panic!("unexpected new value {:?}", other),
    }
}

#[tokio::test]
async fn test_overlapping_crawl_trigger_is_ignored() {
    let server = MockServer::start().await;
    let mut catalog = sample_catalog();
    catalog.root_delay = Duration::from_millis(300);
    catalog.mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let storage = open_storage(&config.output.database_path).unwrap();
    let trigger = Trigger::from_config(config, storage).unwrap();

    let (first, second) = tokio::join!(
        trigger.trigger_crawl(CrawlMode::Resume),
        trigger.trigger_crawl(CrawlMode::Resume)
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert!(first.is_some());
    assert!(second.is_none());
    assert!(!trigger.is_crawl_running());

    // The guard is released once the crawl finishes
    assert!(trigger
        .trigger_crawl(CrawlMode::Resume)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_detection_runs_while_crawl_guard_held() {
    let server = MockServer::start().await;
    let mut catalog = sample_catalog();
    catalog.root_delay = Duration::from_millis(300);
    catalog.mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server, dir.path());
    let storage = open_storage(&config.output.database_path).unwrap();
    let trigger = Trigger::from_config(config, storage).unwrap();

    let (crawl, detection) = tokio::join!(
        trigger.trigger_crawl(CrawlMode::Resume),
        trigger.trigger_change_detection()
    );

    assert!(crawl.unwrap().is_some());
    assert!(detection.unwrap().is_some());
}

#[tokio::test]
async fn test_identical_upsert_short_circuits() {
    let dir = tempfile::tempdir().unwrap();
    let storage = open_storage(&dir.path().join("shelf.db")).unwrap();
    let record = CatalogRecord::from_fields(
        "https://books.example.com/catalogue/sharp-objects/index.html",
        "Mystery",
        ItemFields {
            title: "Sharp Objects".to_string(),
            category: None,
            description: None,
            price_excl_tax: Price::from_minor_units(4782),
            price_incl_tax: Price::from_minor_units(4782),
            availability: "In stock (20 available)".to_string(),
            num_reviews: 0,
            rating: 4,
            image_url: None,
        },
        Utc::now(),
    );

    let mut s = storage::lock(&storage).unwrap();
    assert_eq!(s.upsert_item(&record).unwrap(), UpsertOutcome::Inserted);
    let pending = s.count_pending_detections().unwrap();

    let mut recrawled = record.clone();
    recrawled.last_crawled = Utc::now();
    assert_eq!(s.upsert_item(&recrawled).unwrap(), UpsertOutcome::Unchanged);
    assert_eq!(s.count_pending_detections().unwrap(), pending);
}

#[tokio::test]
async fn test_change_report_written_after_detection() {
    let server = MockServer::start().await;
    let mut catalog = sample_catalog();
    catalog.mount(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let trigger = baseline(&server, dir.path()).await;

    catalog.item_mut("vagabonding").price = "£30.00".to_string();
    catalog.remount(&server).await;
    trigger.trigger_crawl(CrawlMode::Resume).await.unwrap().unwrap();
    let summary = trigger.trigger_change_detection().await.unwrap().unwrap();

    let reports_dir = dir.path().join("reports");
    let paths = write_change_reports(trigger.storage(), &reports_dir, Some(&summary)).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&paths.json).unwrap()).unwrap();
    assert_eq!(json["detection"]["changes_found"], 1);
    assert_eq!(json["totals"]["new_item"], 5);
    assert_eq!(json["totals"]["price_change"], 1);
    assert_eq!(json["changes"][0]["kind"], "price_change");

    let markdown = std::fs::read_to_string(&paths.markdown).unwrap();
    assert!(markdown.contains("## Price Changes (1)"));
    assert!(markdown.contains("36.94"));
    assert!(markdown.contains("30.00"));
}
