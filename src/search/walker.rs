use crate::errors::{ScanWarning, SearchError};
use ignore::{DirEntry, WalkBuilder};
use std::path::{Path, PathBuf};

/// A regular file found below the search root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    /// Path as reached from the root (root-prefixed)
    pub path: PathBuf,
    /// Path relative to the root, used for glob filtering
    pub relative: PathBuf,
}

/// One step of the walk: a file to scan, or an entry that could not be visited.
#[derive(Debug)]
pub enum WalkEvent {
    File(WalkedFile),
    Skipped(ScanWarning),
}

/// Deterministic directory walker.
///
/// Siblings are visited sorted by file name, so a walk over an unchanged tree
/// always yields paths in the same (component-wise lexicographic) order.
pub struct FileWalker {
    root: PathBuf,
    hidden: bool,
    respect_gitignore: bool,
    ignore_patterns: Vec<glob::Pattern>,
}

impl FileWalker {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            hidden: false,
            respect_gitignore: true,
            ignore_patterns: vec![],
        }
    }

    /// Include hidden files and directories.
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_gitignore(mut self, respect: bool) -> Self {
        self.respect_gitignore = respect;
        self
    }

    /// Glob patterns (relative to the root) to leave out of the walk.
    /// Invalid patterns are logged and ignored.
    pub fn with_ignore_patterns(mut self, patterns: &[String]) -> Self {
        self.ignore_patterns = patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    log::warn!("Ignoring invalid ignore pattern {p:?}: {e}");
                    None
                }
            })
            .collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Confirm the root exists and is a directory.
    pub fn check_root(&self) -> Result<(), SearchError> {
        match std::fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(SearchError::RootNotDirectory {
                path: self.root.clone(),
            }),
            Err(_) => Err(SearchError::RootNotFound {
                path: self.root.clone(),
            }),
        }
    }

    /// Lazily walk the tree.
    ///
    /// Failing to read the root itself is fatal; failures below it become
    /// [`WalkEvent::Skipped`].
    pub fn walk(&self) -> Result<impl Iterator<Item = Result<WalkEvent, SearchError>> + '_, SearchError> {
        self.check_root()?;

        let walker = WalkBuilder::new(&self.root)
            .hidden(!self.hidden)
            .git_ignore(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .parents(self.respect_gitignore)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        Ok(walker.filter_map(move |entry| self.classify(entry)))
    }

    /// Walk eagerly, returning files in walk order plus any skipped entries.
    pub fn collect(&self) -> Result<(Vec<WalkedFile>, Vec<ScanWarning>), SearchError> {
        let mut files = Vec::new();
        let mut warnings = Vec::new();
        for event in self.walk()? {
            match event? {
                WalkEvent::File(file) => files.push(file),
                WalkEvent::Skipped(warning) => warnings.push(warning),
            }
        }
        Ok((files, warnings))
    }

    fn classify(
        &self,
        entry: Result<DirEntry, ignore::Error>,
    ) -> Option<Result<WalkEvent, SearchError>> {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => return Some(self.walk_error(err)),
        };

        if !entry.file_type().is_some_and(|t| t.is_file()) {
            return None;
        }

        let path = entry.into_path();
        let relative = path
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.clone());

        if self.is_ignored(&relative) {
            log::trace!("Ignoring {}", path.display());
            return None;
        }

        Some(Ok(WalkEvent::File(WalkedFile { path, relative })))
    }

    fn walk_error(&self, err: ignore::Error) -> Result<WalkEvent, SearchError> {
        let path = error_path(&err);
        if err.depth() == Some(0) || path.as_deref() == Some(self.root.as_path()) {
            return Err(SearchError::Walk {
                path: self.root.clone(),
                source: err,
            });
        }
        Ok(WalkEvent::Skipped(ScanWarning::WalkEntry {
            path,
            reason: err.to_string(),
        }))
    }

    /// Whether a path relative to the root would be visited by the walk,
    /// judged by the hidden and ignore settings alone.
    pub fn admits(&self, relative: &Path) -> bool {
        let hidden = relative
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'));
        (self.hidden || !hidden) && !self.is_ignored(relative)
    }

    fn is_ignored(&self, relative: &Path) -> bool {
        let text = crate::taxonomy::rule::slash_path(relative);
        self.ignore_patterns.iter().any(|p| p.matches(&text))
    }
}

fn error_path(err: &ignore::Error) -> Option<PathBuf> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.clone()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        ignore::Error::Partial(errs) => errs.iter().find_map(error_path),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    fn relatives(files: &[WalkedFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| crate::taxonomy::rule::slash_path(&f.relative))
            .collect()
    }

    #[test]
    fn test_walk_is_sorted() {
        let dir = TempDir::new().unwrap();
        for rel in ["b.txt", "a/z.txt", "a/b/c.txt", "c/a.txt", "a.txt"] {
            touch(dir.path(), rel);
        }

        let (files, warnings) = FileWalker::new(dir.path().to_path_buf()).collect().unwrap();
        assert!(warnings.is_empty());
        assert_eq!(
            relatives(&files),
            vec!["a/b/c.txt", "a/z.txt", "a.txt", "b.txt", "c/a.txt"]
        );
    }

    #[test]
    fn test_hidden_files_skipped_by_default() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), ".hidden/x.txt");
        touch(dir.path(), "shown.txt");

        let (files, _) = FileWalker::new(dir.path().to_path_buf()).collect().unwrap();
        assert_eq!(relatives(&files), vec!["shown.txt"]);

        let (files, _) = FileWalker::new(dir.path().to_path_buf())
            .with_hidden(true)
            .collect()
            .unwrap();
        assert_eq!(relatives(&files), vec![".hidden/x.txt", "shown.txt"]);
    }

    #[test]
    fn test_ignore_patterns() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "node_modules/lib.js");
        touch(dir.path(), "src/app.js");

        let (files, _) = FileWalker::new(dir.path().to_path_buf())
            .with_ignore_patterns(&["node_modules/**".to_string()])
            .collect()
            .unwrap();
        assert_eq!(relatives(&files), vec!["src/app.js"]);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = FileWalker::new(missing).collect().unwrap_err();
        assert!(matches!(err, SearchError::RootNotFound { .. }));
    }

    #[test]
    fn test_file_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "file.txt");
        let err = FileWalker::new(dir.path().join("file.txt"))
            .collect()
            .unwrap_err();
        assert!(matches!(err, SearchError::RootNotDirectory { .. }));
    }
}
