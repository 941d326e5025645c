//! Storage module for persisting catalog data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Idempotent item upserts keyed by canonical URL
//! - The pending-detection queue and the append-only change log
//! - Crawl checkpoint persistence for resumption
//! - Read-only item and change projections

mod query;
mod schema;
mod sqlite;
mod traits;

pub use query::{ChangeQuery, ItemPage, ItemQuery, ItemSort, MAX_CHANGE_LIMIT};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult, UpsertOutcome};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared between the orchestrator, its workers and the detector
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Opens a storage database and wraps it for sharing
pub fn open_storage(path: &Path) -> StorageResult<SharedStorage> {
    Ok(Arc::new(Mutex::new(SqliteStorage::new(path)?)))
}

/// Locks shared storage, mapping a poisoned lock to a storage error
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage.lock().map_err(|_| StorageError::LockPoisoned)
}

/// An item queued for change detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDetection {
    pub id: i64,
    pub item_url: String,
    /// JSON snapshot of the item before the crawl touched it; `None` for new items
    pub prior_snapshot: Option<String>,
    pub queued_at: String,
}

/// Represents a detection pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionRunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub items_scanned: u64,
    pub changes_found: u64,
    pub items_failed: u64,
    pub status: DetectionRunStatus,
}

/// Status of a detection pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionRunStatus {
    Running,
    Completed,
    Failed,
}

impl DetectionRunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
