//! Tool settings from an optional `.code-taxonomy.toml`.
//!
//! Settings are looked up from the working directory upwards. A broken
//! settings file never blocks a run: it is reported and defaults are used.
//! Command-line flags override anything set here.

use crate::report::ReportFormat;
use crate::search::SearchOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE_NAME: &str = ".code-taxonomy.toml";
const MAX_TRAVERSAL_DEPTH: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub search: SearchSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSettings {
    /// Walk hidden files and directories
    pub hidden: bool,
    /// Honour .gitignore and friends
    pub respect_gitignore: bool,
    /// Globs (relative to the root) excluded from the walk
    pub ignore: Vec<String>,
    /// Files larger than this many bytes are skipped with a warning
    pub max_file_size: Option<u64>,
    /// Scan files on a thread pool
    pub parallel: bool,
    /// Worker threads, 0 for one per core
    pub jobs: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            hidden: false,
            respect_gitignore: true,
            ignore: Vec::new(),
            max_file_size: None,
            parallel: true,
            jobs: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    pub format: ReportFormat,
    /// URL prefix for the link column, e.g. `https://github.com/my-org`
    pub link_base: Option<String>,
}

impl Settings {
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            hidden: self.search.hidden,
            respect_gitignore: self.search.respect_gitignore,
            ignore: self.search.ignore.clone(),
            max_file_size: self.search.max_file_size,
        }
    }
}

pub(crate) fn read_settings_file(path: &Path) -> Result<String, std::io::Error> {
    let file = fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    Ok(contents)
}

pub fn parse_settings(contents: &str) -> Result<Settings, String> {
    toml::from_str::<Settings>(contents)
        .map_err(|e| format!("Failed to parse {SETTINGS_FILE_NAME}: {e}"))
}

pub(crate) fn try_load_settings_from_path(path: &Path) -> Option<Settings> {
    let contents = match read_settings_file(path) {
        Ok(contents) => contents,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to read settings file {}: {}", path.display(), e);
            }
            return None;
        }
    };

    match parse_settings(&contents) {
        Ok(settings) => {
            log::debug!("Loaded settings from {}", path.display());
            Some(settings)
        }
        Err(e) => {
            log::warn!("{e}. Using defaults.");
            None
        }
    }
}

pub fn directory_ancestors(start: PathBuf, max_depth: usize) -> impl Iterator<Item = PathBuf> {
    std::iter::successors(Some(start), |dir| {
        let mut parent = dir.clone();
        if parent.pop() {
            Some(parent)
        } else {
            None
        }
    })
    .take(max_depth)
}

/// Load settings from `start` or the nearest ancestor holding a settings file.
pub fn load_settings_from(start: &Path) -> Settings {
    directory_ancestors(start.to_path_buf(), MAX_TRAVERSAL_DEPTH)
        .map(|dir| dir.join(SETTINGS_FILE_NAME))
        .find_map(|path| try_load_settings_from_path(&path))
        .unwrap_or_else(|| {
            log::debug!(
                "No settings found after checking {} directories. Using defaults.",
                MAX_TRAVERSAL_DEPTH
            );
            Settings::default()
        })
}

pub fn load_settings() -> Settings {
    match std::env::current_dir() {
        Ok(dir) => load_settings_from(&dir),
        Err(e) => {
            log::warn!("Failed to get current directory: {}. Using defaults.", e);
            Settings::default()
        }
    }
}
