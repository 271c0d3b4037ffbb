//! Source links for full-mode rows.
//!
//! The search root is expected to hold one checkout per repository
//! (`<root>/<repo>/...`). A record in `<root>/<repo>/<path>` links to
//! `<base>/<repo>/blob/<revision>/<path>#L<line>`, pinned to the checkout's
//! current HEAD.

use crate::search::MatchRecord;
use crate::taxonomy::rule::slash_path;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Resolves links, looking each repository's revision up once per run.
pub struct LinkResolver {
    root: PathBuf,
    base: String,
    revisions: HashMap<String, Option<String>>,
}

impl LinkResolver {
    pub fn new(root: impl Into<PathBuf>, base: &str) -> Self {
        Self {
            root: root.into(),
            base: base.trim_end_matches('/').to_string(),
            revisions: HashMap::new(),
        }
    }

    /// One entry per record, `None` where no link can be built.
    pub fn links(&mut self, records: &[MatchRecord]) -> Vec<Option<String>> {
        records.iter().map(|record| self.link(record)).collect()
    }

    pub fn link(&mut self, record: &MatchRecord) -> Option<String> {
        let relative = record.file_path.strip_prefix(&self.root).ok()?;
        let mut components = relative.components();
        let repo = components.next()?.as_os_str().to_string_lossy().into_owned();
        let rest = components.as_path();
        if rest.as_os_str().is_empty() {
            return None;
        }

        let revision = self.revision(&repo)?;
        Some(format!(
            "{}/{}/blob/{}/{}#L{}",
            self.base,
            repo,
            revision,
            slash_path(rest),
            record.line_number
        ))
    }

    fn revision(&mut self, repo: &str) -> Option<String> {
        if let Some(cached) = self.revisions.get(repo) {
            return cached.clone();
        }

        let revision = head_revision(&self.root.join(repo));
        match &revision {
            Some(rev) => log::debug!("{repo} is at {rev}"),
            None => log::debug!("{repo} is not a git checkout, no links"),
        }
        self.revisions.insert(repo.to_string(), revision.clone());
        revision
    }
}

/// Abbreviated HEAD commit id of the repository at `path`.
pub fn head_revision(path: &Path) -> Option<String> {
    let repo = git2::Repository::open(path).ok()?;
    let commit = repo.head().ok()?.peel_to_commit().ok()?;
    let short = commit.as_object().short_id().ok()?;
    short.as_str().map(str::to_string)
}
