//! Output types and error definitions

use crate::catalog::{Change, ChangeKind};
use crate::detect::DetectionSummary;
use crate::storage::{ChangeQuery, Storage, StorageError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Number of most recent changes included in a report
pub const REPORT_CHANGE_LIMIT: usize = 100;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Snapshot of the change log for reporting
#[derive(Debug, Clone, Serialize)]
pub struct ChangeReport {
    pub generated_at: DateTime<Utc>,
    /// The pass that prompted the report, if any
    pub detection: Option<DetectionSummary>,
    /// All-time change counts keyed by kind
    pub totals: BTreeMap<String, u64>,
    /// Most recent changes, newest first
    pub changes: Vec<Change>,
}

impl ChangeReport {
    pub fn load(
        storage: &dyn Storage,
        detection: Option<&DetectionSummary>,
    ) -> OutputResult<Self> {
        let counts = storage.count_changes_by_kind()?;
        let totals = ChangeKind::ALL
            .iter()
            .map(|kind| {
                (
                    kind.to_db_string().to_string(),
                    counts.get(kind).copied().unwrap_or(0),
                )
            })
            .collect();

        let changes = storage.list_changes(&ChangeQuery {
            kind: None,
            limit: REPORT_CHANGE_LIMIT,
        })?;

        Ok(Self {
            generated_at: Utc::now(),
            detection: detection.copied(),
            totals,
            changes,
        })
    }

    pub fn changes_of(&self, kind: ChangeKind) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(move |c| c.kind == kind)
    }
}

/// Files written for one report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}
