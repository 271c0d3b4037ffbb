//! Error and warning types for taxonomy loading, scanning and reporting.
//!
//! Errors fall in two classes:
//!
//! - **Fatal**: [`DefinitionError`] and [`SearchError`] abort a run before any
//!   report is written.
//! - **Recoverable**: [`ScanWarning`] describes a single file that could not be
//!   scanned. Warnings travel on their own channel and never end up in the
//!   tabular report.

use chrono::NaiveDate;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A problem with the user-authored taxonomy definition.
///
/// Every variant names the offending epic, rule or path so the author can fix
/// the definition without guessing.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The definition file could not be read
    #[error("cannot read taxonomy {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid TOML/YAML/JSON or does not fit the schema
    #[error("malformed taxonomy {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// An epic without a name
    #[error("epic #{index} has an empty name")]
    EmptyName { index: usize },

    /// A required field is absent or empty
    #[error("epic '{epic}' is missing required field '{field}'")]
    MissingField { epic: String, field: &'static str },

    /// Two epics share a name
    #[error("duplicate epic name '{name}'")]
    DuplicateEpic { name: String },

    /// A rule expression does not compile
    #[error("epic '{epic}' rule #{rule}: invalid expression {expression:?}: {reason}")]
    InvalidExpression {
        epic: String,
        rule: usize,
        expression: String,
        reason: String,
    },

    /// A glob filter does not compile
    #[error("epic '{epic}' rule #{rule}: invalid glob {glob:?}: {reason}")]
    InvalidGlob {
        epic: String,
        rule: usize,
        glob: String,
        reason: String,
    },

    /// A fragment refers back to itself, directly or indirectly
    #[error("epic '{epic}': fragment '{fragment}' refers to itself")]
    FragmentCycle { epic: String, fragment: String },

    /// An epic was requested that the taxonomy does not declare
    #[error("unknown epic '{name}' (available: {available})")]
    UnknownEpic { name: String, available: String },

    /// Validation found more than one problem
    #[error("{}", join_errors(.0))]
    Multiple(Vec<DefinitionError>),
}

impl DefinitionError {
    /// Collapse a list of validation failures into a single error.
    ///
    /// Returns `None` for an empty list.
    pub fn from_many(mut errors: Vec<DefinitionError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }

    /// Iterate over the individual problems, flattening `Multiple`.
    pub fn problems(&self) -> Box<dyn Iterator<Item = &DefinitionError> + '_> {
        match self {
            Self::Multiple(errors) => Box::new(errors.iter().flat_map(|e| e.problems())),
            other => Box::new(std::iter::once(other)),
        }
    }
}

fn join_errors(errors: &[DefinitionError]) -> String {
    let lines: Vec<String> = errors.iter().map(|e| format!("  - {e}")).collect();
    format!(
        "{} problems in taxonomy definition:\n{}",
        errors.len(),
        lines.join("\n")
    )
}

/// Fatal problems with the tree being searched.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("root path {path} does not exist")]
    RootNotFound { path: PathBuf },

    #[error("root path {path} is not a directory")]
    RootNotDirectory { path: PathBuf },

    #[error("cannot walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },

    #[error("cannot start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A recoverable, per-file problem.
///
/// The file is skipped and the run continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanWarning {
    /// The file could not be opened or read
    Unreadable { path: PathBuf, reason: String },
    /// The file content is not UTF-8 text
    NotUtf8 { path: PathBuf },
    /// The file exceeds the configured size cap
    TooLarge { path: PathBuf, size: u64, limit: u64 },
    /// A directory entry below the root could not be visited
    WalkEntry { path: Option<PathBuf>, reason: String },
}

impl ScanWarning {
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Unreadable { path, .. } | Self::NotUtf8 { path } | Self::TooLarge { path, .. } => {
                Some(path)
            }
            Self::WalkEntry { path, .. } => path.as_ref(),
        }
    }
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable { path, reason } => {
                write!(f, "skipped {}: {}", path.display(), reason)
            }
            Self::NotUtf8 { path } => write!(f, "skipped {}: not valid UTF-8", path.display()),
            Self::TooLarge { path, size, limit } => write!(
                f,
                "skipped {}: {} bytes exceeds limit of {} bytes",
                path.display(),
                size,
                limit
            ),
            Self::WalkEntry {
                path: Some(path),
                reason,
            } => write!(f, "skipped {}: {}", path.display(), reason),
            Self::WalkEntry { path: None, reason } => write!(f, "skipped entry: {reason}"),
        }
    }
}

/// Receiver for recoverable warnings.
///
/// Kept separate from the report sink so warnings are never interleaved with
/// tabular output.
pub trait WarningSink {
    fn warn(&mut self, warning: ScanWarning);
}

impl WarningSink for Vec<ScanWarning> {
    fn warn(&mut self, warning: ScanWarning) {
        self.push(warning);
    }
}

/// Any failure of a complete run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("cannot write report: {0}")]
    Report(#[from] ReportError),
}

/// Fatal problems while counting matches over git history.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("date range starts on {from} but ends earlier, on {to}")]
    EmptyRange { from: NaiveDate, to: NaiveDate },

    #[error("no git repository at {path} or directly below it")]
    NoRepository { path: PathBuf },

    #[error("date {date} is too far in the past for {repository}")]
    DateTooEarly { date: NaiveDate, repository: String },

    #[error("cannot list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git error in {path}: {source}")]
    Git {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },
}

/// Failure while rendering or writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
