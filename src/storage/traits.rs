//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::catalog::{CatalogRecord, Change, ChangeKind};
use crate::state::CrawlState;
use crate::storage::query::{ChangeQuery, ItemPage, ItemQuery};
use crate::storage::{DetectionRunRecord, PendingDetection};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Detection run not found: {0}")]
    DetectionRunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result of an idempotent upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No row existed for the URL
    Inserted,
    /// The fingerprint differed; the row was overwritten
    Updated { prior: Box<CatalogRecord> },
    /// The fingerprint matched; nothing was written
    Unchanged,
}

impl UpsertOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            UpsertOutcome::Inserted => "inserted",
            UpsertOutcome::Updated { .. } => "updated",
            UpsertOutcome::Unchanged => "unchanged",
        }
    }
}

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the crawler, the change
/// detector and the read-only projections.
pub trait Storage {
    // ===== Items =====

    /// Inserts or updates an item keyed by its canonical URL
    ///
    /// An unchanged fingerprint writes nothing. Inserted and updated items are
    /// queued for change detection in the same transaction.
    fn upsert_item(&mut self, record: &CatalogRecord) -> StorageResult<UpsertOutcome>;

    /// Gets an item by canonical URL
    fn get_item(&self, url: &str) -> StorageResult<Option<CatalogRecord>>;

    /// Gets the HTML backup stored with the item's latest inserted or updated state
    fn get_raw_html(&self, url: &str) -> StorageResult<Option<String>>;

    /// Lists items matching a filter, sorted and paginated
    fn list_items(&self, query: &ItemQuery) -> StorageResult<ItemPage>;

    // ===== Crawl State =====

    /// Loads the crawl checkpoint, or a not-started state if none was saved
    fn load_crawl_state(&self) -> StorageResult<CrawlState>;

    /// Atomically replaces the crawl checkpoint
    fn save_crawl_state(&mut self, state: &CrawlState) -> StorageResult<()>;

    // ===== Change Detection =====

    /// Gets the highest pending detection id, if any entries are queued
    fn max_pending_id(&self) -> StorageResult<Option<i64>>;

    /// Gets queued detections with `after_id < id <= max_id`, oldest first
    fn pending_detections(
        &self,
        after_id: i64,
        max_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<PendingDetection>>;

    /// Records the changes found for one pending entry and removes the entry
    ///
    /// `diffed` is the item state the changes were computed against. If the item
    /// has moved on since, it is queued again with `diffed` as its prior.
    fn commit_detection(
        &mut self,
        pending: &PendingDetection,
        diffed: &CatalogRecord,
        changes: &[Change],
    ) -> StorageResult<()>;

    /// Removes a pending entry that cannot be diffed
    fn discard_detection(&mut self, pending_id: i64) -> StorageResult<()>;

    /// Creates a detection run record and returns its id
    fn create_detection_run(&mut self) -> StorageResult<i64>;

    /// Records the outcome of a detection run
    fn finish_detection_run(&mut self, record: &DetectionRunRecord) -> StorageResult<()>;

    /// Gets the most recent detection run
    fn get_latest_detection_run(&self) -> StorageResult<Option<DetectionRunRecord>>;

    /// Lists changes newest first
    fn list_changes(&self, query: &ChangeQuery) -> StorageResult<Vec<Change>>;

    // ===== Statistics =====

    /// Counts all items
    fn count_items(&self) -> StorageResult<u64>;

    /// Counts items per category, ordered by category name
    fn count_items_by_category(&self) -> StorageResult<Vec<(String, u64)>>;

    /// Counts changes per kind
    fn count_changes_by_kind(&self) -> StorageResult<HashMap<ChangeKind, u64>>;

    /// Counts queued detections
    fn count_pending_detections(&self) -> StorageResult<u64>;
}
