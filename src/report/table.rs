use super::Report;
use crate::errors::ReportError;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use std::io::Write;

pub(super) fn write(report: &Report<'_>, out: &mut dyn Write) -> Result<(), ReportError> {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(report.header());

    for row in report.rows() {
        table.add_row(row);
    }

    writeln!(out, "{table}")?;
    Ok(())
}
