//! JSON change report

use crate::output::traits::{ChangeReport, OutputResult};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes a change report as pretty-printed JSON
pub fn write_json_report(report: &ChangeReport, output_path: &Path) -> OutputResult<()> {
    let mut writer = BufWriter::new(File::create(output_path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Change, ChangeKind, ChangeValue, Price};
    use chrono::Utc;
    use std::collections::BTreeMap;

    #[test]
    fn test_write_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = ChangeReport {
            generated_at: Utc::now(),
            detection: None,
            totals: BTreeMap::from([("price_change".to_string(), 1)]),
            changes: vec![Change {
                id: Some(1),
                item_url: "https://example.com/a".to_string(),
                kind: ChangeKind::PriceChange,
                prior: Some(ChangeValue::Price(Price::from_minor_units(1000))),
                new: ChangeValue::Price(Price::from_minor_units(1200)),
                detected_at: Utc::now(),
                item_title: "A".to_string(),
                run_id: 1,
            }],
        };

        write_json_report(&report, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["totals"]["price_change"], 1);
        assert_eq!(value["changes"][0]["kind"], "price_change");
        assert_eq!(value["changes"][0]["new"]["value"], 1200);
    }
}
