//! Statistics generation from the catalog database
//!
//! This module provides functionality for extracting and displaying
//! catalog, crawl and detection statistics from the storage layer.

use crate::catalog::ChangeKind;
use crate::output::traits::OutputResult;
use crate::state::CrawlState;
use crate::storage::{DetectionRunRecord, Storage};
use std::collections::HashMap;

/// Catalog statistics summary
#[derive(Debug, Clone)]
pub struct CatalogStatistics {
    /// Total number of items in the record store
    pub total_items: u64,

    /// Item counts per category, ordered by category name
    pub items_by_category: Vec<(String, u64)>,

    /// All-time change counts per kind
    pub changes_by_kind: HashMap<ChangeKind, u64>,

    /// Items waiting for a detection pass
    pub pending_detections: u64,

    /// The current crawl checkpoint
    pub crawl_state: CrawlState,

    /// The most recent detection pass, if any
    pub last_detection: Option<DetectionRunRecord>,
}

impl CatalogStatistics {
    pub fn total_changes(&self) -> u64 {
        self.changes_by_kind.values().sum()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
pub fn load_statistics(storage: &dyn Storage) -> OutputResult<CatalogStatistics> {
    Ok(CatalogStatistics {
        total_items: storage.count_items()?,
        items_by_category: storage.count_items_by_category()?,
        changes_by_kind: storage.count_changes_by_kind()?,
        pending_detections: storage.count_pending_detections()?,
        crawl_state: storage.load_crawl_state()?,
        last_detection: storage.get_latest_detection_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CatalogStatistics) {
    println!("=== Catalog Statistics ===\n");

    println!("Overview:");
    println!("  Total items: {}", stats.total_items);
    println!("  Categories: {}", stats.items_by_category.len());
    println!("  Pending detections: {}", stats.pending_detections);
    println!();

    if !stats.items_by_category.is_empty() {
        println!("Items by Category:");
        let mut category_counts: Vec<_> = stats.items_by_category.iter().collect();
        category_counts.sort_by(|a, b| b.1.cmp(&a.1));

        for (category, count) in category_counts {
            let percentage = if stats.total_items > 0 {
                (*count as f64 / stats.total_items as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", category, count, percentage);
        }
        println!();
    }

    println!("Changes ({} total):", stats.total_changes());
    for kind in ChangeKind::ALL {
        let count = stats.changes_by_kind.get(&kind).copied().unwrap_or(0);
        println!("  {}: {}", kind, count);
    }
    println!();

    let state = &stats.crawl_state;
    let counters = &state.counters;
    println!("Last Crawl:");
    println!("  Status: {}", state.status);
    if let Some(started_at) = state.started_at {
        println!("  Started: {}", started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("  Updated: {}", state.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(cursor) = &state.cursor {
        println!("  Cursor: {} page {}", cursor.category, cursor.page);
    }
    println!(
        "  Pages: {} processed, {} failed",
        counters.pages_processed, counters.pages_failed
    );
    println!(
        "  Items: {} processed ({} new, {} updated, {} unchanged), {} skipped, {} failed",
        counters.items_processed,
        counters.items_new,
        counters.items_updated,
        counters.items_unchanged,
        counters.items_skipped(),
        counters.items_failed()
    );
    if let Some(error) = &state.last_error {
        println!("  Last error: {}", error);
    }
    println!();

    match &stats.last_detection {
        Some(run) => {
            println!("Last Detection:");
            println!("  Run: {} ({})", run.id, run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished_at) = &run.finished_at {
                println!("  Finished: {}", finished_at);
            }
            println!(
                "  Scanned {} items, found {} changes, {} failed",
                run.items_scanned, run.changes_found, run.items_failed
            );
        }
        None => println!("No detection passes recorded."),
    }
}
