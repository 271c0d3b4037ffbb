//! Dispatch from a taxonomy to a finished report over the working tree.

use crate::aggregate::aggregate;
use crate::errors::{ReportError, RunError, WarningSink};
use crate::links::LinkResolver;
use crate::progress::ProgressConfig;
use crate::report::{Report, ReportFormat, ReportMode};
use crate::search::{SearchEngine, SearchOptions};
use crate::taxonomy::Taxonomy;
use std::io::Write;
use std::path::PathBuf;

/// Everything a run needs besides the taxonomy itself.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub root: PathBuf,
    pub mode: ReportMode,
    pub format: ReportFormat,
    /// Epic names or keys to restrict to; empty means all
    pub epics: Vec<String>,
    pub parallel: bool,
    pub jobs: usize,
    pub search: SearchOptions,
    pub link_base: Option<String>,
    pub progress: ProgressConfig,
}

impl RunOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mode: ReportMode::default(),
            format: ReportFormat::default(),
            epics: Vec::new(),
            parallel: false,
            jobs: 0,
            search: SearchOptions::new(),
            link_base: None,
            progress: ProgressConfig::default(),
        }
    }
}

/// Counts describing a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub matches: usize,
    pub epics: usize,
    pub warnings: usize,
}

/// Scan `options.root` with the selected epics and write the report to `out`.
///
/// The report is fully rendered in memory and written only once the scan and
/// aggregation finished, so a failed run never leaves a truncated report
/// behind. Warnings go to `warnings` as they occur.
pub fn run(
    taxonomy: &Taxonomy,
    options: &RunOptions,
    out: &mut dyn Write,
    warnings: &mut dyn WarningSink,
) -> Result<RunSummary, RunError> {
    let selection = taxonomy.select(&options.epics)?;
    let progress = options.progress.create_counter("Scanning");
    let engine = SearchEngine::new(selection, &options.root, &options.search)
        .with_progress(progress.clone());

    let aggregation = if options.parallel {
        let items = engine.scan_parallel(options.jobs)?;
        aggregate(engine.selection(), items.into_iter().map(Ok), warnings)?
    } else {
        aggregate(engine.selection(), engine.scan()?, warnings)?
    };
    progress.finish_and_clear();

    let mut report = Report::new(&aggregation, options.mode);
    if let (ReportMode::Full, Some(base)) = (options.mode, options.link_base.as_deref()) {
        let mut resolver = LinkResolver::new(&options.root, base);
        report = report.with_links(resolver.links(aggregation.records()));
    }

    let mut buffer = Vec::new();
    report.render(options.format, &mut buffer)?;
    out.write_all(&buffer).map_err(ReportError::from)?;
    out.flush().map_err(ReportError::from)?;

    Ok(RunSummary {
        matches: aggregation.total(),
        epics: aggregation.summary().len(),
        warnings: aggregation.warning_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{DefinitionError, ScanWarning, SearchError};
    use crate::taxonomy::loader::{inline_origin, parse_taxonomy, DocumentFormat};
    use std::fs;
    use tempfile::TempDir;

    fn taxonomy() -> Taxonomy {
        parse_taxonomy(
            r#"
            [[epic]]
            name = "templates"
            component = "frontend"
            [[epic.rule]]
            expression = '\{% include'
            "#,
            DocumentFormat::Toml,
            &inline_origin(),
        )
        .unwrap()
    }

    #[test]
    fn test_summary_run() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.html"), "{% include 'a' %}\n{% include 'b' %}\n").unwrap();
        fs::write(dir.path().join("b.html"), "{% include 'c' %}\n").unwrap();

        let options = RunOptions {
            mode: ReportMode::Summary,
            ..RunOptions::new(dir.path())
        };
        let mut out = Vec::new();
        let mut warnings: Vec<ScanWarning> = Vec::new();
        let summary = run(&taxonomy(), &options, &mut out, &mut warnings).unwrap();

        assert_eq!(summary.matches, 3);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "epic,component,count\ntemplates,frontend,3\n"
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_failed_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let options = RunOptions::new(dir.path().join("missing"));
        let mut out = Vec::new();
        let err = run(&taxonomy(), &options, &mut out, &mut Vec::<ScanWarning>::new()).unwrap_err();

        assert!(matches!(err, RunError::Search(SearchError::RootNotFound { .. })));
        assert!(out.is_empty());
    }

    #[test]
    fn test_unknown_epic_is_fatal() {
        let dir = TempDir::new().unwrap();
        let options = RunOptions {
            epics: vec!["forms".into()],
            ..RunOptions::new(dir.path())
        };
        let mut out = Vec::new();
        let err = run(&taxonomy(), &options, &mut out, &mut Vec::<ScanWarning>::new()).unwrap_err();

        assert!(matches!(
            err,
            RunError::Definition(DefinitionError::UnknownEpic { .. })
        ));
        assert!(out.is_empty());
    }
}
