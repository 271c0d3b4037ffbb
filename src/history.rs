//! Match counts over past revisions, one snapshot per week.
//!
//! Each snapshot date is resolved to the last commit on the first-parent
//! history of `HEAD` made before that date ended (UTC). The files of that
//! commit are read straight from the object database and go through the same
//! scan and aggregation as a working-tree run. Neither the working tree nor
//! `HEAD` is touched, so uncommitted changes and detached heads are fine.
//!
//! The search root is either a repository itself or a directory holding one
//! checkout per repository, the same layout the link column expects.

use crate::aggregate::{aggregate, AggregateEntry};
use crate::errors::{HistoryError, RunError, ScanWarning, SearchError, WarningSink};
use crate::search::walker::{FileWalker, WalkedFile};
use crate::search::{applicable_rules, scan_content, ScanItem, SearchOptions};
use crate::taxonomy::EpicSelection;
use chrono::{Days, NaiveDate, NaiveTime};
use git2::{ObjectType, Oid, Repository, TreeWalkMode, TreeWalkResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Days between two snapshots.
pub const SNAPSHOT_INTERVAL_DAYS: u64 = 7;

const SYMLINK_MODE: i32 = 0o120000;

/// Counts for one snapshot date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    /// Short commit id scanned in each repository
    pub revisions: BTreeMap<String, String>,
    /// Total matches over all selected epics
    pub count: usize,
    /// Per-epic counts, in declaration order
    pub epics: Vec<AggregateEntry>,
}

/// Snapshot dates from `from`, every [`SNAPSHOT_INTERVAL_DAYS`], up to and
/// including `to`.
pub fn snapshot_dates(from: NaiveDate, to: NaiveDate) -> Result<Vec<NaiveDate>, HistoryError> {
    if from > to {
        return Err(HistoryError::EmptyRange { from, to });
    }
    Ok(
        std::iter::successors(Some(from), |date| {
            date.checked_add_days(Days::new(SNAPSHOT_INTERVAL_DAYS))
        })
        .take_while(|date| *date <= to)
        .collect(),
    )
}

/// One repository below (or at) the search root.
pub struct HistoryRepository {
    /// Location relative to the search root; empty when the root is the repository
    prefix: PathBuf,
    path: PathBuf,
    repo: Repository,
    /// First-parent chain from `HEAD`, newest first, with commit times
    chain: Vec<(Oid, i64)>,
}

impl HistoryRepository {
    fn open(root: &Path, prefix: PathBuf) -> Option<Result<Self, HistoryError>> {
        let path = root.join(&prefix);
        let repo = Repository::open(&path).ok()?;
        let chain = match first_parent_chain(&repo) {
            Ok(chain) => chain,
            Err(source) => return Some(Err(HistoryError::Git { path, source })),
        };
        Some(Ok(Self {
            prefix,
            path,
            repo,
            chain,
        }))
    }

    /// Display name: the directory below the root, or `.` for the root itself.
    pub fn name(&self) -> String {
        if self.prefix.as_os_str().is_empty() {
            ".".to_string()
        } else {
            self.prefix.to_string_lossy().into_owned()
        }
    }

    /// Last commit made before the end of `date` (UTC).
    pub fn revision_at(&self, date: NaiveDate) -> Option<Oid> {
        let cutoff = end_of_day(date);
        self.chain
            .iter()
            .find(|(_, time)| *time < cutoff)
            .map(|(oid, _)| *oid)
    }

    fn short_id(&self, oid: Oid) -> Result<String, HistoryError> {
        let object = self.repo.find_object(oid, None).map_err(|e| self.git_error(e))?;
        let short = object.short_id().map_err(|e| self.git_error(e))?;
        Ok(short.as_str().unwrap_or_default().to_string())
    }

    /// Scan the files of commit `oid`, appending records and warnings to `items`.
    fn scan_commit(
        &self,
        oid: Oid,
        root: &Path,
        selection: &EpicSelection<'_>,
        filter: &FileWalker,
        max_file_size: Option<u64>,
        items: &mut Vec<ScanItem>,
    ) -> Result<(), HistoryError> {
        let tree = self
            .repo
            .find_commit(oid)
            .and_then(|commit| commit.tree())
            .map_err(|e| self.git_error(e))?;

        let mut blobs = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
            if entry.kind() == Some(ObjectType::Blob) && entry.filemode() != SYMLINK_MODE {
                if let Some(name) = entry.name() {
                    blobs.push((self.prefix.join(dir).join(name), entry.id()));
                }
            }
            TreeWalkResult::Ok
        })
        .map_err(|e| self.git_error(e))?;
        blobs.sort();

        for (relative, id) in blobs {
            if !filter.admits(&relative) {
                continue;
            }
            let rules = applicable_rules(selection, &relative);
            if rules.is_empty() {
                continue;
            }

            let file = WalkedFile {
                path: root.join(&relative),
                relative,
            };
            let blob = self.repo.find_blob(id).map_err(|e| self.git_error(e))?;
            let size = blob.size() as u64;
            if let Some(limit) = max_file_size.filter(|limit| size > *limit) {
                items.push(ScanItem::Warning(ScanWarning::TooLarge {
                    path: file.path,
                    size,
                    limit,
                }));
                continue;
            }
            match std::str::from_utf8(blob.content()) {
                Ok(content) => items.extend(
                    scan_content(&file, content, &rules)
                        .into_iter()
                        .map(ScanItem::Match),
                ),
                Err(_) => items.push(ScanItem::Warning(ScanWarning::NotUtf8 { path: file.path })),
            }
        }
        Ok(())
    }

    fn git_error(&self, source: git2::Error) -> HistoryError {
        HistoryError::Git {
            path: self.path.clone(),
            source,
        }
    }
}

/// The root itself when it is a repository, otherwise every repository
/// directly below it, in name order.
pub fn discover_repositories(root: &Path) -> Result<Vec<HistoryRepository>, HistoryError> {
    if let Some(repo) = HistoryRepository::open(root, PathBuf::new()) {
        return Ok(vec![repo?]);
    }

    let entries = fs::read_dir(root).map_err(|source| HistoryError::Io {
        path: root.to_path_buf(),
        source,
    })?;
    let mut names: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .map(|entry| PathBuf::from(entry.file_name()))
        .collect();
    names.sort();

    let repositories = names
        .into_iter()
        .filter_map(|name| HistoryRepository::open(root, name))
        .collect::<Result<Vec<_>, _>>()?;
    if repositories.is_empty() {
        return Err(HistoryError::NoRepository {
            path: root.to_path_buf(),
        });
    }
    Ok(repositories)
}

/// Count the selected epics at every snapshot date.
///
/// Every date must resolve to a commit in every repository; otherwise the
/// most recent date that does not is reported and nothing is scanned.
pub fn scan_history(
    selection: &EpicSelection<'_>,
    root: &Path,
    dates: &[NaiveDate],
    options: &SearchOptions,
    warnings: &mut dyn WarningSink,
) -> Result<Vec<HistoryPoint>, RunError> {
    let filter = FileWalker::new(root.to_path_buf())
        .with_hidden(options.hidden)
        .with_ignore_patterns(&options.ignore);
    filter.check_root()?;

    let repositories = discover_repositories(root)?;
    let plan = plan_revisions(&repositories, dates)?;

    let mut points = Vec::with_capacity(dates.len());
    for (date, revisions) in dates.iter().zip(plan) {
        let mut items = Vec::new();
        let mut scanned = BTreeMap::new();
        for (repository, oid) in repositories.iter().zip(revisions) {
            log::debug!("{date}: scanning {} at {oid}", repository.name());
            repository.scan_commit(
                oid,
                root,
                selection,
                &filter,
                options.max_file_size,
                &mut items,
            )?;
            scanned.insert(repository.name(), repository.short_id(oid)?);
        }

        let aggregation = aggregate(selection, items.into_iter().map(Ok::<_, SearchError>), warnings)?;
        log::info!("{date}: {} matches", aggregation.total());
        points.push(HistoryPoint {
            date: *date,
            revisions: scanned,
            count: aggregation.total(),
            epics: aggregation.summary().to_vec(),
        });
    }
    Ok(points)
}

/// Commit per date per repository, resolved before any scanning starts.
fn plan_revisions(
    repositories: &[HistoryRepository],
    dates: &[NaiveDate],
) -> Result<Vec<Vec<Oid>>, HistoryError> {
    for repository in repositories {
        if let Some(date) = dates
            .iter()
            .rev()
            .find(|date| repository.revision_at(**date).is_none())
        {
            return Err(HistoryError::DateTooEarly {
                date: *date,
                repository: repository.name(),
            });
        }
    }

    Ok(dates
        .iter()
        .map(|date| {
            repositories
                .iter()
                .filter_map(|repository| repository.revision_at(*date))
                .collect()
        })
        .collect())
}

fn first_parent_chain(repo: &Repository) -> Result<Vec<(Oid, i64)>, git2::Error> {
    let mut walk = repo.revwalk()?;
    walk.push_head()?;
    walk.simplify_first_parent()?;
    walk.map(|oid| {
        let oid = oid?;
        let commit = repo.find_commit(oid)?;
        Ok((oid, commit.time().seconds()))
    })
    .collect()
}

fn end_of_day(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp() + 86_400
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::loader::{inline_origin, parse_taxonomy, DocumentFormat};
    use crate::taxonomy::Taxonomy;
    use git2::{Signature, Time};
    use tempfile::TempDir;

    // 2024-01-02T12:00:00Z and 2024-01-10T12:00:00Z
    const FIRST_COMMIT: i64 = 1_704_196_800;
    const SECOND_COMMIT: i64 = 1_704_888_000;

    fn taxonomy() -> Taxonomy {
        parse_taxonomy(
            r#"
            [[epic]]
            name = "templates"
            component = "jinja"
            globs = ["*.html"]
            [[epic.rule]]
            expression = '\{% include'

            [[epic]]
            name = "python"
            [[epic.rule]]
            expression = "^import "
            "#,
            DocumentFormat::Toml,
            &inline_origin(),
        )
        .unwrap()
    }

    fn date(text: &str) -> NaiveDate {
        text.parse().unwrap()
    }

    fn commit_at(repo: &Repository, message: &str, seconds: i64) {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let signature = Signature::new("Test", "test@example.com", &Time::new(seconds, 0)).unwrap();
        let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .unwrap();
    }

    /// A repository with three includes on 2024-01-02 and one on 2024-01-10.
    fn dated_repository(path: &Path) -> Repository {
        fs::create_dir_all(path.join("templates")).unwrap();
        let repo = Repository::init(path).unwrap();
        fs::write(
            path.join("templates/base.html"),
            "{% include 'a' %}\n{% include 'b' %}\n",
        )
        .unwrap();
        fs::write(path.join("templates/page.html"), "{% include 'c' %}\n").unwrap();
        commit_at(&repo, "add templates", FIRST_COMMIT);

        fs::write(path.join("templates/base.html"), "<main></main>\n").unwrap();
        commit_at(&repo, "drop base includes", SECOND_COMMIT);
        repo
    }

    #[test]
    fn test_snapshot_dates_are_weekly_and_inclusive() {
        assert_eq!(
            snapshot_dates(date("2024-01-03"), date("2024-01-17")).unwrap(),
            vec![date("2024-01-03"), date("2024-01-10"), date("2024-01-17")]
        );
        assert_eq!(
            snapshot_dates(date("2024-01-03"), date("2024-01-03")).unwrap(),
            vec![date("2024-01-03")]
        );
        assert!(matches!(
            snapshot_dates(date("2024-01-10"), date("2024-01-03")),
            Err(HistoryError::EmptyRange { .. })
        ));
    }

    #[test]
    fn test_counts_follow_committed_history() {
        let dir = TempDir::new().unwrap();
        dated_repository(dir.path());
        let taxonomy = taxonomy();
        let dates = snapshot_dates(date("2024-01-03"), date("2024-01-17")).unwrap();

        let mut warnings: Vec<ScanWarning> = Vec::new();
        let points = scan_history(
            &taxonomy.select_all(),
            dir.path(),
            &dates,
            &SearchOptions::new(),
            &mut warnings,
        )
        .unwrap();

        let counts: Vec<(NaiveDate, usize)> = points.iter().map(|p| (p.date, p.count)).collect();
        assert_eq!(
            counts,
            vec![
                (date("2024-01-03"), 3),
                (date("2024-01-10"), 1),
                (date("2024-01-17"), 1),
            ]
        );
        assert_eq!(points[0].epics[0].count, 3);
        assert_eq!(points[0].epics[1].count, 0);
        assert_ne!(points[0].revisions["."], points[1].revisions["."]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_working_tree_and_head_are_left_alone() {
        let dir = TempDir::new().unwrap();
        let repo = dated_repository(dir.path());
        let head_before = repo.head().unwrap().target();
        fs::write(dir.path().join("templates/page.html"), "uncommitted\n").unwrap();

        let taxonomy = taxonomy();
        let mut warnings: Vec<ScanWarning> = Vec::new();
        let points = scan_history(
            &taxonomy.select_all(),
            dir.path(),
            &[date("2024-01-05")],
            &SearchOptions::new(),
            &mut warnings,
        )
        .unwrap();

        assert_eq!(points[0].count, 3);
        assert_eq!(repo.head().unwrap().target(), head_before);
        assert_eq!(
            fs::read_to_string(dir.path().join("templates/page.html")).unwrap(),
            "uncommitted\n"
        );
    }

    #[test]
    fn test_date_before_first_commit_is_rejected() {
        let dir = TempDir::new().unwrap();
        dated_repository(dir.path());
        let taxonomy = taxonomy();
        let dates = [date("2023-12-25"), date("2024-01-01"), date("2024-01-08")];

        let mut warnings: Vec<ScanWarning> = Vec::new();
        let err = scan_history(
            &taxonomy.select_all(),
            dir.path(),
            &dates,
            &SearchOptions::new(),
            &mut warnings,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            RunError::History(HistoryError::DateTooEarly { date: d, .. }) if d == date("2024-01-01")
        ));
    }

    #[test]
    fn test_repositories_below_root_are_prefixed() {
        let dir = TempDir::new().unwrap();
        dated_repository(&dir.path().join("frontend"));
        fs::create_dir_all(dir.path().join("notes")).unwrap();

        let repositories = discover_repositories(dir.path()).unwrap();
        let names: Vec<String> = repositories.iter().map(HistoryRepository::name).collect();
        assert_eq!(names, vec!["frontend"]);

        let taxonomy = taxonomy();
        let selection = taxonomy.select(&["templates"]).unwrap();
        let mut items = Vec::new();
        let oid = repositories[0].revision_at(date("2024-01-20")).unwrap();
        repositories[0]
            .scan_commit(
                oid,
                dir.path(),
                &selection,
                &FileWalker::new(dir.path().to_path_buf()),
                None,
                &mut items,
            )
            .unwrap();

        let paths: Vec<PathBuf> = items
            .iter()
            .filter_map(|item| match item {
                ScanItem::Match(record) => Some(record.file_path.clone()),
                ScanItem::Warning(_) => None,
            })
            .collect();
        assert_eq!(paths, vec![dir.path().join("frontend/templates/page.html")]);
    }

    #[test]
    fn test_root_without_repositories_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("plain")).unwrap();
        assert!(matches!(
            discover_repositories(dir.path()),
            Err(HistoryError::NoRepository { .. })
        ));
    }
}
