//! Output module for reports and statistics
//!
//! This module handles:
//! - Writing change reports as JSON and markdown after a detection pass
//! - Loading and printing catalog statistics

mod json;
mod markdown;
pub mod stats;
mod traits;

pub use json::write_json_report;
pub use markdown::{format_markdown_report, generate_markdown_report};
pub use stats::{load_statistics, print_statistics, CatalogStatistics};
pub use traits::{ChangeReport, OutputError, OutputResult, ReportPaths, REPORT_CHANGE_LIMIT};

use crate::detect::DetectionSummary;
use crate::storage::{self, SharedStorage};
use chrono::Utc;
use std::path::Path;
use tracing::info;

/// Writes `change_report_<timestamp>.json` and `.md` into `dir`
///
/// The directory is created if missing. The storage lock is held only while the
/// report is loaded.
pub fn write_change_reports(
    storage: &SharedStorage,
    dir: &Path,
    summary: Option<&DetectionSummary>,
) -> OutputResult<ReportPaths> {
    let report = {
        let guard = storage::lock(storage)?;
        ChangeReport::load(&*guard, summary)?
    };

    std::fs::create_dir_all(dir)?;

    let stem = format!("change_report_{}", Utc::now().format("%Y%m%d_%H%M%S"));
    let paths = ReportPaths {
        json: dir.join(format!("{}.json", stem)),
        markdown: dir.join(format!("{}.md", stem)),
    };

    write_json_report(&report, &paths.json)?;
    generate_markdown_report(&report, &paths.markdown)?;

    info!(
        "Wrote change report with {} changes to {}",
        report.changes.len(),
        paths.json.display()
    );

    Ok(paths)
}
