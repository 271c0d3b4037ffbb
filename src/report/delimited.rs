use super::Report;
use crate::errors::ReportError;
use std::io::Write;

/// Header plus one row per line; fields holding the delimiter, quotes or
/// line breaks are quoted.
pub(super) fn write(report: &Report<'_>, delimiter: u8, out: &mut dyn Write) -> Result<(), ReportError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(out);

    writer.write_record(report.header())?;
    for row in report.rows() {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}
