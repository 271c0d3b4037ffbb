//! Aggregation of the scan stream into the full record list and per-epic counts.
//!
//! The whole stream is consumed before anything is returned, so a report is
//! only ever built from a completed scan.

use crate::errors::{ScanWarning, SearchError, WarningSink};
use crate::search::{MatchRecord, ScanItem};
use crate::taxonomy::EpicSelection;
use serde::Serialize;

/// Match count for one `(epic, component)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateEntry {
    pub epic: String,
    pub component: Option<String>,
    pub count: usize,
}

/// Both report views of a finished scan.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    records: Vec<MatchRecord>,
    summary: Vec<AggregateEntry>,
    warnings: usize,
}

impl Aggregation {
    /// Every match, in scan order.
    pub fn records(&self) -> &[MatchRecord] {
        &self.records
    }

    /// One entry per selected epic, in declaration order, zero counts included.
    pub fn summary(&self) -> &[AggregateEntry] {
        &self.summary
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }

    /// Number of warnings forwarded during the scan.
    pub fn warning_count(&self) -> usize {
        self.warnings
    }
}

/// Incremental builder behind [`aggregate`].
pub struct Aggregator<'s, 't> {
    selection: &'s EpicSelection<'t>,
    counts: Vec<usize>,
    records: Vec<MatchRecord>,
    warnings: usize,
}

impl<'s, 't> Aggregator<'s, 't> {
    pub fn new(selection: &'s EpicSelection<'t>) -> Self {
        Self {
            selection,
            counts: vec![0; selection.taxonomy().len()],
            records: Vec::new(),
            warnings: 0,
        }
    }

    pub fn push(&mut self, record: MatchRecord) {
        if let Some(count) = self.counts.get_mut(record.epic_index) {
            *count += 1;
        }
        self.records.push(record);
    }

    pub fn warn(&mut self, warning: ScanWarning, sink: &mut dyn WarningSink) {
        self.warnings += 1;
        sink.warn(warning);
    }

    pub fn finish(self) -> Aggregation {
        let summary = self
            .selection
            .epics()
            .map(|(index, epic)| AggregateEntry {
                epic: epic.name().to_string(),
                component: epic.component().map(str::to_string),
                count: self.counts[index],
            })
            .collect();

        Aggregation {
            records: self.records,
            summary,
            warnings: self.warnings,
        }
    }
}

/// Consume a scan stream completely.
///
/// Warnings are forwarded to `sink` as they arrive. A fatal error anywhere in
/// the stream discards everything gathered so far.
pub fn aggregate<I>(
    selection: &EpicSelection<'_>,
    items: I,
    sink: &mut dyn WarningSink,
) -> Result<Aggregation, SearchError>
where
    I: IntoIterator<Item = Result<ScanItem, SearchError>>,
{
    let mut aggregator = Aggregator::new(selection);
    for item in items {
        match item? {
            ScanItem::Match(record) => aggregator.push(record),
            ScanItem::Warning(warning) => aggregator.warn(warning, sink),
        }
    }

    let aggregation = aggregator.finish();
    log::info!(
        "Found {} matches across {} epics ({} warnings)",
        aggregation.total(),
        aggregation.summary().len(),
        aggregation.warning_count()
    );
    Ok(aggregation)
}
