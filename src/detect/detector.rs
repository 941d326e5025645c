//! Change detection pass over the pending-detection queue

use crate::catalog::{CatalogRecord, Change};
use crate::detect::diff::diff_records;
use crate::scheduler::RunGuard;
use crate::storage::{
    self, DetectionRunRecord, DetectionRunStatus, PendingDetection, SharedStorage, Storage,
    StorageError,
};
use crate::Result;
use chrono::Utc;
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

const DEFAULT_BATCH_SIZE: usize = 100;

/// Per-item failure during a detection pass; counted and skipped
#[derive(Debug, Error)]
pub enum DetectionItemError {
    #[error("malformed prior snapshot for {url}: {source}")]
    MalformedSnapshot {
        url: String,
        source: serde_json::Error,
    },

    #[error("item {0} is no longer in the store")]
    MissingItem(String),
}

enum PassError {
    Item(DetectionItemError),
    Storage(StorageError),
}

impl From<DetectionItemError> for PassError {
    fn from(e: DetectionItemError) -> Self {
        PassError::Item(e)
    }
}

impl From<StorageError> for PassError {
    fn from(e: StorageError) -> Self {
        PassError::Storage(e)
    }
}

/// Summary of one detection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DetectionSummary {
    pub run_id: i64,
    pub changes_found: u64,
    pub items_scanned: u64,
    pub items_failed: u64,
    pub duration_ms: u64,
}

/// Diffs items touched by crawls against their prior state
pub struct ChangeDetector {
    storage: SharedStorage,
    guard: RunGuard,
    batch_size: usize,
}

impl ChangeDetector {
    pub fn new(storage: SharedStorage) -> Self {
        Self {
            storage,
            guard: RunGuard::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    /// Runs one detection pass
    ///
    /// Returns `Ok(None)` without doing anything if a pass is already running.
    /// Entries queued after the pass starts are left for the next pass.
    pub async fn detect_changes(&self) -> Result<Option<DetectionSummary>> {
        let Some(_permit) = self.guard.try_start() else {
            info!("Change detection already running; skipping");
            return Ok(None);
        };

        let start_time = Instant::now();
        let run_id = storage::lock(&self.storage)?.create_detection_run()?;
        let started_at = Utc::now().to_rfc3339();
        info!("Change detection run {} started", run_id);

        let mut summary = DetectionSummary {
            run_id,
            ..Default::default()
        };
        let result = self.drain(run_id, &mut summary).await;
        summary.duration_ms = start_time.elapsed().as_millis() as u64;

        let status = if result.is_ok() {
            DetectionRunStatus::Completed
        } else {
            DetectionRunStatus::Failed
        };
        storage::lock(&self.storage)?.finish_detection_run(&DetectionRunRecord {
            id: run_id,
            started_at,
            finished_at: Some(Utc::now().to_rfc3339()),
            items_scanned: summary.items_scanned,
            changes_found: summary.changes_found,
            items_failed: summary.items_failed,
            status,
        })?;
        result?;

        info!(
            "Change detection run {} finished: {} changes across {} items ({} failed) in {}ms",
            run_id,
            summary.changes_found,
            summary.items_scanned,
            summary.items_failed,
            summary.duration_ms
        );
        Ok(Some(summary))
    }

    async fn drain(&self, run_id: i64, summary: &mut DetectionSummary) -> Result<()> {
        let Some(max_id) = storage::lock(&self.storage)?.max_pending_id()? else {
            debug!("No pending items to diff");
            return Ok(());
        };

        let mut after_id = 0;
        loop {
            let batch = storage::lock(&self.storage)?.pending_detections(
                after_id,
                max_id,
                self.batch_size,
            )?;
            if batch.is_empty() {
                break;
            }

            for pending in &batch {
                after_id = pending.id;
                summary.items_scanned += 1;
                match self.detect_item(run_id, pending) {
                    Ok(found) => summary.changes_found += found,
                    Err(PassError::Item(e)) => {
                        warn!("Discarding pending detection: {}", e);
                        summary.items_failed += 1;
                        storage::lock(&self.storage)?.discard_detection(pending.id)?;
                    }
                    Err(PassError::Storage(e)) => return Err(e.into()),
                }
            }

            // Let a concurrent crawl get at the store between batches
            tokio::task::yield_now().await;
        }

        Ok(())
    }

    fn detect_item(
        &self,
        run_id: i64,
        pending: &PendingDetection,
    ) -> std::result::Result<u64, PassError> {
        let prior: Option<CatalogRecord> = pending
            .prior_snapshot
            .as_deref()
            .map(serde_json::from_str::<CatalogRecord>)
            .transpose()
            .map_err(|source| DetectionItemError::MalformedSnapshot {
                url: pending.item_url.clone(),
                source,
            })?;

        let mut storage = storage::lock(&self.storage)?;
        let current = storage
            .get_item(&pending.item_url)?
            .ok_or_else(|| DetectionItemError::MissingItem(pending.item_url.clone()))?;

        let detected_at = Utc::now();
        let changes: Vec<Change> = diff_records(prior.as_ref(), &current)
            .into_iter()
            .map(|draft| draft.into_change(&current, run_id, detected_at))
            .collect();

        storage.commit_detection(pending, &current, &changes)?;

        for change in &changes {
            debug!(
                "{} {}: {} -> {}",
                change.kind,
                change.item_url,
                change
                    .prior
                    .as_ref()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                change.new
            );
        }
        Ok(changes.len() as u64)
    }
}
