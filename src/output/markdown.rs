//! Markdown change report generation
//!
//! This module generates a human-readable report of detected changes, grouped by
//! kind, for the most recent entries of the change log.

use crate::catalog::{Change, ChangeKind};
use crate::output::traits::{ChangeReport, OutputResult};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a change report as markdown
///
/// # Arguments
///
/// * `report` - The change report
/// * `output_path` - Path where the markdown file should be written
pub fn generate_markdown_report(report: &ChangeReport, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_report(report);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a change report as markdown
pub fn format_markdown_report(report: &ChangeReport) -> String {
    let mut md = String::new();

    md.push_str("# Shelfwatch Change Report\n\n");
    md.push_str(&format!(
        "- **Generated**: {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    if let Some(detection) = &report.detection {
        md.push_str(&format!("- **Detection Run**: {}\n", detection.run_id));
        md.push_str(&format!(
            "- **Changes Found**: {}\n",
            detection.changes_found
        ));
        md.push_str(&format!(
            "- **Items Scanned**: {}\n",
            detection.items_scanned
        ));
        md.push_str(&format!("- **Items Failed**: {}\n", detection.items_failed));
        md.push_str(&format!("- **Duration**: {} ms\n", detection.duration_ms));
    }
    md.push('\n');

    md.push_str("## Totals\n\n");
    md.push_str("| Kind | Count |\n");
    md.push_str("|------|-------|\n");
    for (kind, count) in &report.totals {
        md.push_str(&format!("| {} | {} |\n", kind, count));
    }
    md.push('\n');

    if report.changes.is_empty() {
        md.push_str("No changes recorded.\n");
        return md;
    }

    section(
        &mut md,
        "New Items",
        report.changes_of(ChangeKind::NewItem),
        |c| format!("| {} | {} | {} |\n", escape(&c.item_title), c.new, c.detected_at.format("%Y-%m-%d %H:%M")),
        "| Title | Item | Detected |\n|-------|------|----------|\n",
    );
    section(
        &mut md,
        "Price Changes",
        report.changes_of(ChangeKind::PriceChange),
        row_with_prior,
        "| Title | Before | After | Detected |\n|-------|--------|-------|----------|\n",
    );
    section(
        &mut md,
        "Availability Changes",
        report.changes_of(ChangeKind::AvailabilityChange),
        row_with_prior,
        "| Title | Before | After | Detected |\n|-------|--------|-------|----------|\n",
    );

    md
}

fn section<'a>(
    md: &mut String,
    title: &str,
    changes: impl Iterator<Item = &'a Change>,
    row: impl Fn(&Change) -> String,
    header: &str,
) {
    let rows: Vec<String> = changes.map(row).collect();
    if rows.is_empty() {
        return;
    }

    md.push_str(&format!("## {} ({})\n\n", title, rows.len()));
    md.push_str(header);
    for r in rows {
        md.push_str(&r);
    }
    md.push('\n');
}

fn row_with_prior(change: &Change) -> String {
    let prior = change
        .prior
        .as_ref()
        .map(|p| escape(&p.to_string()))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "| {} | {} | {} | {} |\n",
        escape(&change.item_title),
        prior,
        escape(&change.new.to_string()),
        change.detected_at.format("%Y-%m-%d %H:%M")
    )
}

/// Escapes table cell separators
fn escape(text: &str) -> String {
    text.replace('|', "\\|")
}
