//! Report rendering.
//!
//! A report is rendered from a finished [`Aggregation`] in one of two modes
//! and one of several formats. Rows are written in exactly the order the
//! aggregation holds them.

mod delimited;
mod history;
mod json;
mod table;

pub use history::{render_history, HISTORY_COLUMNS};

use crate::aggregate::Aggregation;
use crate::errors::ReportError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Which view of the aggregation to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportMode {
    /// One row per match
    #[default]
    Full,
    /// One row per epic with its match count
    Summary,
}

/// Output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Comma separated values, for spreadsheet import
    #[default]
    Csv,
    /// Tab separated values
    Tsv,
    /// JSON array
    Json,
    /// Human readable terminal table
    Table,
}

pub const FULL_COLUMNS: [&str; 6] = ["file", "line", "epic", "component", "match", "code"];
pub const LINK_COLUMN: &str = "link";
pub const SUMMARY_COLUMNS: [&str; 3] = ["epic", "component", "count"];

/// A renderable report over a finished aggregation.
pub struct Report<'a> {
    aggregation: &'a Aggregation,
    mode: ReportMode,
    links: Option<Vec<Option<String>>>,
}

impl<'a> Report<'a> {
    pub fn new(aggregation: &'a Aggregation, mode: ReportMode) -> Self {
        Self {
            aggregation,
            mode,
            links: None,
        }
    }

    /// Add a `link` column to full-mode rows. `links` is parallel to the
    /// aggregation's records.
    pub fn with_links(mut self, links: Vec<Option<String>>) -> Self {
        self.links = Some(links);
        self
    }

    pub fn render(&self, format: ReportFormat, out: &mut dyn Write) -> Result<(), ReportError> {
        match format {
            ReportFormat::Csv => delimited::write(self, b',', out),
            ReportFormat::Tsv => delimited::write(self, b'\t', out),
            ReportFormat::Json => json::write(self, out),
            ReportFormat::Table => table::write(self, out),
        }
    }

    /// Render into memory.
    pub fn render_to_string(&self, format: ReportFormat) -> Result<String, ReportError> {
        let mut buffer = Vec::new();
        self.render(format, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    fn header(&self) -> Vec<&'static str> {
        match self.mode {
            ReportMode::Full => {
                let mut columns = FULL_COLUMNS.to_vec();
                if self.links.is_some() {
                    columns.push(LINK_COLUMN);
                }
                columns
            }
            ReportMode::Summary => SUMMARY_COLUMNS.to_vec(),
        }
    }

    /// Rows as plain strings, in aggregation order.
    fn rows(&self) -> Vec<Vec<String>> {
        match self.mode {
            ReportMode::Full => self
                .aggregation
                .records()
                .iter()
                .enumerate()
                .map(|(i, record)| {
                    let mut row = vec![
                        record.file_path.to_string_lossy().into_owned(),
                        record.line_number.to_string(),
                        record.epic_name.clone(),
                        record.component.clone().unwrap_or_default(),
                        record.matched_text.clone(),
                        record.line_text.clone(),
                    ];
                    if let Some(links) = &self.links {
                        row.push(links.get(i).cloned().flatten().unwrap_or_default());
                    }
                    row
                })
                .collect(),
            ReportMode::Summary => self
                .aggregation
                .summary()
                .iter()
                .map(|entry| {
                    vec![
                        entry.epic.clone(),
                        entry.component.clone().unwrap_or_default(),
                        entry.count.to_string(),
                    ]
                })
                .collect(),
        }
    }
}
