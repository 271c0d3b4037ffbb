use super::{Report, ReportMode};
use crate::errors::ReportError;
use crate::search::MatchRecord;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct LinkedRecord<'a> {
    #[serde(flatten)]
    record: &'a MatchRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<&'a str>,
}

pub(super) fn write(report: &Report<'_>, out: &mut dyn Write) -> Result<(), ReportError> {
    match report.mode {
        ReportMode::Full => {
            let rows: Vec<LinkedRecord<'_>> = report
                .aggregation
                .records()
                .iter()
                .enumerate()
                .map(|(i, record)| LinkedRecord {
                    record,
                    link: report
                        .links
                        .as_ref()
                        .and_then(|links| links.get(i))
                        .and_then(|link| link.as_deref()),
                })
                .collect();
            serde_json::to_writer_pretty(&mut *out, &rows)?;
        }
        ReportMode::Summary => {
            serde_json::to_writer_pretty(&mut *out, report.aggregation.summary())?;
        }
    }
    writeln!(out)?;
    Ok(())
}
