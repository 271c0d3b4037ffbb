//! Rendering of per-date totals from a history scan.

use super::ReportFormat;
use crate::errors::ReportError;
use crate::history::HistoryPoint;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use std::io::Write;

pub const HISTORY_COLUMNS: [&str; 2] = ["date", "count"];

/// One `date,count` row per snapshot, oldest first. JSON output also carries
/// the scanned revisions and per-epic counts.
pub fn render_history(
    points: &[HistoryPoint],
    format: ReportFormat,
    out: &mut dyn Write,
) -> Result<(), ReportError> {
    let rows = points
        .iter()
        .map(|point| [point.date.format("%Y-%m-%d").to_string(), point.count.to_string()]);

    match format {
        ReportFormat::Csv | ReportFormat::Tsv => {
            let delimiter = if format == ReportFormat::Tsv { b'\t' } else { b',' };
            let mut writer = csv::WriterBuilder::new()
                .delimiter(delimiter)
                .from_writer(out);
            writer.write_record(HISTORY_COLUMNS)?;
            for row in rows {
                writer.write_record(&row)?;
            }
            writer.flush()?;
        }
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, points)?;
            writeln!(out)?;
        }
        ReportFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(HISTORY_COLUMNS);
            for row in rows {
                table.add_row(row);
            }
            writeln!(out, "{table}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregateEntry;
    use std::collections::BTreeMap;

    fn point(date: &str, count: usize) -> HistoryPoint {
        HistoryPoint {
            date: date.parse().unwrap(),
            revisions: BTreeMap::from([("frontend".to_string(), "abc1234".to_string())]),
            count,
            epics: vec![AggregateEntry {
                epic: "templates".into(),
                component: None,
                count,
            }],
        }
    }

    #[test]
    fn test_delimited_history_is_date_then_count() {
        let points = [point("2024-01-03", 3), point("2024-01-10", 1)];
        let mut out = Vec::new();
        render_history(&points, ReportFormat::Csv, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "date,count\n2024-01-03,3\n2024-01-10,1\n"
        );
    }

    #[test]
    fn test_json_history_carries_revisions_and_epics() {
        let mut out = Vec::new();
        render_history(&[point("2024-01-03", 3)], ReportFormat::Json, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["date"], "2024-01-03");
        assert_eq!(value[0]["count"], 3);
        assert_eq!(value[0]["revisions"]["frontend"], "abc1234");
        assert_eq!(value[0]["epics"][0]["epic"], "templates");
    }
}
