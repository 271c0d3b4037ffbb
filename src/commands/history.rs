//! Weekly match totals over git history.

use crate::errors::{ReportError, RunError, WarningSink};
use crate::history::{scan_history, snapshot_dates};
use crate::report::{render_history, ReportFormat};
use crate::search::SearchOptions;
use crate::taxonomy::Taxonomy;
use chrono::NaiveDate;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct HistoryOptions {
    pub root: PathBuf,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub format: ReportFormat,
    /// Epic names or keys to restrict to; empty means all
    pub epics: Vec<String>,
    pub search: SearchOptions,
}

/// Count the selected epics once a week from `from` to `to` and write one
/// row per date to `out`.
///
/// Like [`run`](super::run), nothing is written unless every snapshot was
/// scanned. Returns the number of snapshots.
pub fn run_history(
    taxonomy: &Taxonomy,
    options: &HistoryOptions,
    out: &mut dyn Write,
    warnings: &mut dyn WarningSink,
) -> Result<usize, RunError> {
    let selection = taxonomy.select(&options.epics)?;
    let dates = snapshot_dates(options.from, options.to)?;
    log::info!(
        "Counting {} epics at {} dates from {} to {}",
        selection.len(),
        dates.len(),
        options.from,
        options.to
    );

    let points = scan_history(&selection, &options.root, &dates, &options.search, warnings)?;

    let mut buffer = Vec::new();
    render_history(&points, options.format, &mut buffer)?;
    out.write_all(&buffer).map_err(ReportError::from)?;
    out.flush().map_err(ReportError::from)?;
    Ok(points.len())
}
