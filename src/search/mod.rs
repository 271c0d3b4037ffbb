//! The search engine: walk a tree and apply the selected epics' rules to
//! every file.
//!
//! Files are visited in a stable, sorted order and only one file's content is
//! held in memory at a time during a sequential scan. The parallel scan
//! spreads per-file work across a rayon pool and reassembles results in walk
//! order, so both modes produce the same record sequence.

pub mod scanner;
pub mod walker;

use crate::errors::{ScanWarning, SearchError};
use crate::taxonomy::EpicSelection;
use indicatif::ProgressBar;
use rayon::prelude::*;
use scanner::ApplicableRule;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walker::{FileWalker, WalkEvent, WalkedFile};

pub use scanner::{scan_content, LineIndex};

/// One occurrence of a rule matching text in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    #[serde(rename = "file")]
    pub file_path: PathBuf,
    /// One-based line of the match start
    #[serde(rename = "line")]
    pub line_number: usize,
    /// One-based byte column of the match start
    pub column: usize,
    #[serde(rename = "epic")]
    pub epic_name: String,
    pub component: Option<String>,
    #[serde(rename = "match")]
    pub matched_text: String,
    /// The trimmed source line the match starts on
    #[serde(rename = "code")]
    pub line_text: String,
    /// Text captured by named groups and fragments
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, String>,
    /// Declaration index of the epic within the taxonomy
    #[serde(skip)]
    pub epic_index: usize,
}

/// An element of the scan stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanItem {
    Match(MatchRecord),
    Warning(ScanWarning),
}

/// Walk and read settings.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub hidden: bool,
    pub respect_gitignore: bool,
    pub ignore: Vec<String>,
    pub max_file_size: Option<u64>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self {
            respect_gitignore: true,
            ..Self::default()
        }
    }
}

/// Outcome of scanning one file.
#[derive(Debug)]
enum FileScan {
    Matches(Vec<MatchRecord>),
    Skipped(ScanWarning),
}

pub struct SearchEngine<'t> {
    selection: EpicSelection<'t>,
    walker: FileWalker,
    max_file_size: Option<u64>,
    progress: ProgressBar,
}

impl<'t> SearchEngine<'t> {
    pub fn new(selection: EpicSelection<'t>, root: impl Into<PathBuf>, options: &SearchOptions) -> Self {
        let walker = FileWalker::new(root.into())
            .with_hidden(options.hidden)
            .with_gitignore(options.respect_gitignore)
            .with_ignore_patterns(&options.ignore);

        Self {
            selection,
            walker,
            max_file_size: options.max_file_size,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report each scanned file on `progress`.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn root(&self) -> &Path {
        self.walker.root()
    }

    pub fn selection(&self) -> &EpicSelection<'t> {
        &self.selection
    }

    /// Lazily scan the tree, one file at a time.
    ///
    /// A missing or unreadable root fails immediately; per-file problems show
    /// up as [`ScanItem::Warning`] in the stream.
    pub fn scan(&self) -> Result<Scan<'_, 't>, SearchError> {
        let events = self.walker.walk()?;
        log::debug!(
            "Scanning {} with {} epics",
            self.root().display(),
            self.selection.len()
        );
        Ok(Scan {
            engine: self,
            events: Box::new(events),
            pending: Vec::new().into_iter(),
        })
    }

    /// Scan files on a pool of `jobs` threads (0 means one per core).
    ///
    /// The walk itself is sequential; results are gathered in walk order.
    pub fn scan_parallel(&self, jobs: usize) -> Result<Vec<ScanItem>, SearchError> {
        let events: Vec<WalkEvent> = self.walker.walk()?.collect::<Result<_, _>>()?;
        let threads = if jobs == 0 { num_cpus::get() } else { jobs };
        log::debug!(
            "Scanning {} files from {} on {} threads",
            events.len(),
            self.root().display(),
            threads
        );

        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
        let per_event: Vec<Vec<ScanItem>> = pool.install(|| {
            events
                .into_par_iter()
                .map(|event| match event {
                    WalkEvent::File(file) => self.scan_file(&file).into_items(),
                    WalkEvent::Skipped(warning) => vec![ScanItem::Warning(warning)],
                })
                .collect()
        });

        Ok(per_event.into_iter().flatten().collect())
    }

    fn scan_file(&self, file: &WalkedFile) -> FileScan {
        self.progress.inc(1);

        let rules = applicable_rules(&self.selection, &file.relative);
        if rules.is_empty() {
            return FileScan::Matches(Vec::new());
        }

        match self.read_text(&file.path) {
            Ok(content) => {
                let records = scan_content(file, &content, &rules);
                if !records.is_empty() {
                    log::trace!("{}: {} matches", file.path.display(), records.len());
                }
                FileScan::Matches(records)
            }
            Err(warning) => {
                log::debug!("{warning}");
                FileScan::Skipped(warning)
            }
        }
    }

    fn read_text(&self, path: &Path) -> Result<String, ScanWarning> {
        let unreadable = |e: std::io::Error| ScanWarning::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        if let Some(limit) = self.max_file_size {
            let size = fs::metadata(path).map_err(unreadable)?.len();
            if size > limit {
                return Err(ScanWarning::TooLarge {
                    path: path.to_path_buf(),
                    size,
                    limit,
                });
            }
        }

        let bytes = fs::read(path).map_err(unreadable)?;
        String::from_utf8(bytes).map_err(|_| ScanWarning::NotUtf8 {
            path: path.to_path_buf(),
        })
    }
}

/// Rules of the selected epics whose globs admit `relative`, in epic then
/// rule order.
pub(crate) fn applicable_rules<'t>(
    selection: &EpicSelection<'t>,
    relative: &Path,
) -> Vec<ApplicableRule<'t>> {
    selection
        .epics()
        .flat_map(|(epic_index, epic)| {
            epic.rules()
                .iter()
                .filter(move |rule| rule.applies_to(relative))
                .map(move |rule| ApplicableRule {
                    epic_index,
                    epic,
                    rule,
                })
        })
        .collect()
}

impl FileScan {
    fn into_items(self) -> Vec<ScanItem> {
        match self {
            Self::Matches(records) => records.into_iter().map(ScanItem::Match).collect(),
            Self::Skipped(warning) => vec![ScanItem::Warning(warning)],
        }
    }
}

/// Lazy scan stream returned by [`SearchEngine::scan`].
///
/// Single pass: re-scanning requires a new walk.
pub struct Scan<'e, 't> {
    engine: &'e SearchEngine<'t>,
    events: Box<dyn Iterator<Item = Result<WalkEvent, SearchError>> + 'e>,
    pending: std::vec::IntoIter<ScanItem>,
}

impl Iterator for Scan<'_, '_> {
    type Item = Result<ScanItem, SearchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.next() {
                return Some(Ok(item));
            }
            match self.events.next()? {
                Ok(WalkEvent::File(file)) => {
                    self.pending = self.engine.scan_file(&file).into_items().into_iter();
                }
                Ok(WalkEvent::Skipped(warning)) => return Some(Ok(ScanItem::Warning(warning))),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
