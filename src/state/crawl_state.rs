use super::RunStatus;
use crate::{Result, ShelfError};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Marker under which the singleton crawl state is stored
pub const CRAWLER_STATE_TYPE: &str = "crawler";

/// Position of the next listing page to process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlCursor {
    pub category: String,
    /// 1-based page number within the category
    pub page: u32,
    pub page_url: String,
}

/// Per-run counters, carried across resumes of the same run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrawlCounters {
    pub pages_processed: u64,
    pub pages_failed: u64,
    /// Items whose upsert committed
    pub items_processed: u64,
    pub items_new: u64,
    pub items_updated: u64,
    pub items_unchanged: u64,
    pub fetch_failures: u64,
    pub parse_failures: u64,
    pub store_failures: u64,
}

impl CrawlCounters {
    /// Items that never reached the store
    pub fn items_skipped(&self) -> u64 {
        self.fetch_failures + self.parse_failures
    }

    pub fn items_failed(&self) -> u64 {
        self.store_failures
    }
}

/// The crawl checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlState {
    pub status: RunStatus,
    /// Next page to process; `None` before the first page or after completion
    pub cursor: Option<CrawlCursor>,
    pub last_item_url: Option<String>,
    pub counters: CrawlCounters,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl Default for CrawlState {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlState {
    /// A state for a store that has never been crawled
    pub fn new() -> Self {
        Self {
            status: RunStatus::NotStarted,
            cursor: None,
            last_item_url: None,
            counters: CrawlCounters::default(),
            started_at: None,
            updated_at: Utc::now(),
            last_error: None,
        }
    }

    /// A fresh in-progress state with zeroed counters and no cursor
    pub fn begin(now: DateTime<Utc>) -> Self {
        Self {
            status: RunStatus::InProgress,
            cursor: None,
            last_item_url: None,
            counters: CrawlCounters::default(),
            started_at: Some(now),
            updated_at: now,
            last_error: None,
        }
    }

    /// Returns true if this state names an interrupted run that can be resumed
    pub fn is_resumable(&self) -> bool {
        self.status == RunStatus::InProgress
    }

    /// Moves to `next`, rejecting illegal transitions
    pub fn transition(&mut self, next: RunStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(ShelfError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        if next == RunStatus::Completed {
            self.cursor = None;
        }
        Ok(())
    }

    /// Marks the run failed with a reason
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition(RunStatus::Failed)?;
        self.last_error = Some(reason.into());
        Ok(())
    }

    /// Advances the cursor to the next page to process
    pub fn advance_to(&mut self, cursor: CrawlCursor) {
        self.cursor = Some(cursor);
        self.updated_at = Utc::now();
    }
}
