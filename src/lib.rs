//! Find and classify code with a declarative taxonomy.
//!
//! A [`Taxonomy`] of named epics, each holding regex [`PatternRule`]s, is run
//! over a directory tree by the [`SearchEngine`]. Every match becomes a
//! [`MatchRecord`]; the [`aggregate`] step counts them per epic and a
//! [`Report`] renders either every match or the per-epic counts as delimited
//! text ready for spreadsheet import.
//!
//! ```no_run
//! use code_taxonomy::{load_taxonomy, run, RunOptions, ReportMode};
//! use std::path::Path;
//!
//! let taxonomy = load_taxonomy(Path::new("taxonomy.toml"))?;
//! let options = RunOptions {
//!     mode: ReportMode::Summary,
//!     ..RunOptions::new("src")
//! };
//! let mut warnings: Vec<code_taxonomy::ScanWarning> = Vec::new();
//! run(&taxonomy, &options, &mut std::io::stdout(), &mut warnings)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod aggregate;
pub mod cli;
pub mod commands;
pub mod config;
pub mod errors;
pub mod history;
pub mod links;
pub mod progress;
pub mod report;
pub mod search;
pub mod taxonomy;

pub use crate::aggregate::{aggregate, AggregateEntry, Aggregation, Aggregator};
pub use crate::commands::{run, run_history, HistoryOptions, RunOptions, RunSummary};
pub use crate::errors::{
    DefinitionError, HistoryError, ReportError, RunError, ScanWarning, SearchError, WarningSink,
};
pub use crate::history::HistoryPoint;
pub use crate::report::{Report, ReportFormat, ReportMode};
pub use crate::search::{MatchRecord, ScanItem, SearchEngine, SearchOptions};
pub use crate::taxonomy::{
    load_taxonomy, parse_taxonomy, DocumentFormat, EpicDefinition, EpicSelection, GlobFilter,
    PatternRule, RuleOptions, Taxonomy,
};
