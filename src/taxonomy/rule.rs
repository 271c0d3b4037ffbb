//! Compiled pattern rules and their path filters.

use glob::{MatchOptions, Pattern};
use regex::{Regex, RegexBuilder};
use std::path::Path;

/// Upper bound on the compiled size of a single rule expression.
///
/// The regex engine guarantees linear-time matching; this cap additionally
/// rejects expressions whose compiled automaton would be unreasonably large.
pub const EXPRESSION_SIZE_LIMIT: usize = 10 * (1 << 20);

/// Options controlling how an expression is compiled and applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleOptions {
    pub case_sensitive: bool,
    pub multiline: bool,
}

impl Default for RuleOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            multiline: false,
        }
    }
}

/// One compiled match rule. Immutable once built.
#[derive(Debug, Clone)]
pub struct PatternRule {
    /// Expression as authored, before fragment expansion
    source: String,
    regex: Regex,
    filter: GlobFilter,
    options: RuleOptions,
}

impl PatternRule {
    /// Compile an already fragment-expanded expression.
    ///
    /// `source` is kept for display; `expanded` is what gets compiled.
    pub fn compile(
        source: impl Into<String>,
        expanded: &str,
        filter: GlobFilter,
        options: RuleOptions,
    ) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(expanded)
            .case_insensitive(!options.case_sensitive)
            .multi_line(options.multiline)
            .crlf(true)
            .size_limit(EXPRESSION_SIZE_LIMIT)
            .build()?;

        Ok(Self {
            source: source.into(),
            regex,
            filter,
            options,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn is_multiline(&self) -> bool {
        self.options.multiline
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.options.case_sensitive
    }

    /// Whether this rule should be applied to the file at `relative`
    /// (path relative to the search root).
    pub fn applies_to(&self, relative: &Path) -> bool {
        self.filter.matches(relative)
    }
}

/// Include/exclude glob list.
///
/// Entries prefixed with `!` exclude. A path is accepted when it matches no
/// exclude and either there are no includes or it matches one of them.
#[derive(Debug, Clone, Default)]
pub struct GlobFilter {
    include: Vec<PathGlob>,
    exclude: Vec<PathGlob>,
}

impl GlobFilter {
    /// Build a filter from authored globs.
    ///
    /// On failure returns the offending glob and the reason.
    pub fn new<S: AsRef<str>>(globs: &[S]) -> Result<Self, (String, String)> {
        let mut filter = Self::default();
        for raw in globs {
            let raw = raw.as_ref();
            let (negated, text) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, raw),
            };
            let glob = PathGlob::new(text).map_err(|e| (raw.to_string(), e.msg.to_string()))?;
            if negated {
                filter.exclude.push(glob);
            } else {
                filter.include.push(glob);
            }
        }
        Ok(filter)
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn matches(&self, relative: &Path) -> bool {
        if self.exclude.iter().any(|g| g.matches(relative)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|g| g.matches(relative))
    }
}

/// A single glob. Globs without a separator match the file name only;
/// globs with one match the whole relative path.
#[derive(Debug, Clone)]
struct PathGlob {
    pattern: Pattern,
    basename_only: bool,
}

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl PathGlob {
    fn new(text: &str) -> Result<Self, glob::PatternError> {
        Ok(Self {
            pattern: Pattern::new(text)?,
            basename_only: !text.contains('/'),
        })
    }

    fn matches(&self, relative: &Path) -> bool {
        if self.basename_only {
            relative
                .file_name()
                .map(|name| self.pattern.matches_with(&name.to_string_lossy(), GLOB_OPTIONS))
                .unwrap_or(false)
        } else {
            self.pattern
                .matches_with(&slash_path(relative), GLOB_OPTIONS)
        }
    }
}

/// Render a relative path with `/` separators on every platform.
pub(crate) fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
