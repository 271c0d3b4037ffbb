//! Per-file scanning: apply rules to one file's text and emit match records.

use super::walker::WalkedFile;
use super::MatchRecord;
use crate::taxonomy::{EpicDefinition, PatternRule};
use regex::Captures;
use std::collections::BTreeMap;
use std::path::Path;

/// A rule together with the epic that owns it.
#[derive(Debug, Clone, Copy)]
pub struct ApplicableRule<'t> {
    pub epic_index: usize,
    pub epic: &'t EpicDefinition,
    pub rule: &'t PatternRule,
}

/// Byte offsets of line starts, for mapping multiline matches back to lines.
#[derive(Debug)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(content: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            content
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { starts }
    }

    /// Zero-based line containing `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&start| start <= offset) - 1
    }

    pub fn line_start(&self, line: usize) -> usize {
        self.starts[line]
    }

    /// Text of a zero-based line without its terminator.
    pub fn line_text<'c>(&self, content: &'c str, line: usize) -> &'c str {
        let start = self.starts[line];
        let end = self
            .starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(content.len());
        let text = &content[start..end];
        text.strip_suffix('\r').unwrap_or(text)
    }
}

/// Scan one file's content with every applicable rule.
///
/// Records come back ordered by line; within a line they keep epic order,
/// then rule order, then match position. Every match produces its own
/// record, including repeated matches on one line.
pub fn scan_content(
    file: &WalkedFile,
    content: &str,
    rules: &[ApplicableRule<'_>],
) -> Vec<MatchRecord> {
    let path = file.path.as_path();
    let mut records = Vec::new();
    let mut index = None;

    for applicable in rules {
        if applicable.rule.is_multiline() {
            let index = index.get_or_insert_with(|| LineIndex::new(content));
            scan_buffer(path, content, index, applicable, &mut records);
        } else {
            scan_lines(path, content, applicable, &mut records);
        }
    }

    records.sort_by_key(|record| record.line_number);
    records
}

fn scan_lines(
    path: &Path,
    content: &str,
    applicable: &ApplicableRule<'_>,
    records: &mut Vec<MatchRecord>,
) {
    let regex = applicable.rule.regex();
    for (line_index, line) in content.lines().enumerate() {
        for captures in regex.captures_iter(line) {
            let whole = match captures.get(0) {
                Some(m) => m,
                None => continue,
            };
            records.push(MatchRecord {
                file_path: path.to_path_buf(),
                line_number: line_index + 1,
                column: whole.start() + 1,
                matched_text: whole.as_str().to_string(),
                line_text: line.trim().to_string(),
                epic_name: applicable.epic.name().to_string(),
                component: applicable.epic.component().map(str::to_string),
                groups: named_groups(applicable.rule, &captures),
                epic_index: applicable.epic_index,
            });
        }
    }
}

fn scan_buffer(
    path: &Path,
    content: &str,
    index: &LineIndex,
    applicable: &ApplicableRule<'_>,
    records: &mut Vec<MatchRecord>,
) {
    for captures in applicable.rule.regex().captures_iter(content) {
        let whole = match captures.get(0) {
            Some(m) => m,
            None => continue,
        };
        let line = index.line_of(whole.start());
        records.push(MatchRecord {
            file_path: path.to_path_buf(),
            line_number: line + 1,
            column: whole.start() - index.line_start(line) + 1,
            matched_text: whole.as_str().to_string(),
            line_text: index.line_text(content, line).trim().to_string(),
            epic_name: applicable.epic.name().to_string(),
            component: applicable.epic.component().map(str::to_string),
            groups: named_groups(applicable.rule, &captures),
            epic_index: applicable.epic_index,
        });
    }
}

fn named_groups(rule: &PatternRule, captures: &Captures<'_>) -> BTreeMap<String, String> {
    rule.regex()
        .capture_names()
        .flatten()
        .filter_map(|name| {
            captures
                .name(name)
                .map(|m| (name.to_string(), m.as_str().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{GlobFilter, RuleOptions};
    use std::path::PathBuf;

    fn rule(expression: &str, multiline: bool) -> PatternRule {
        PatternRule::compile(
            expression,
            expression,
            GlobFilter::default(),
            RuleOptions {
                case_sensitive: true,
                multiline,
            },
        )
        .unwrap()
    }

    fn file() -> WalkedFile {
        WalkedFile {
            path: PathBuf::from("root/page.html"),
            relative: PathBuf::from("page.html"),
        }
    }

    #[test]
    fn test_line_index_maps_offsets() {
        let content = "ab\ncd\r\n\nef";
        let index = LineIndex::new(content);
        assert_eq!(index.line_of(0), 0);
        assert_eq!(index.line_of(3), 1);
        assert_eq!(index.line_of(7), 2);
        assert_eq!(index.line_of(8), 3);
        assert_eq!(index.line_text(content, 1), "cd");
        assert_eq!(index.line_text(content, 2), "");
        assert_eq!(index.line_text(content, 3), "ef");
    }

    #[test]
    fn test_multiple_matches_on_one_line_are_separate_records() {
        let epic = EpicDefinition::new("tags", None, vec![rule("<b>", false)]);
        let rules = [ApplicableRule {
            epic_index: 0,
            epic: &epic,
            rule: &epic.rules()[0],
        }];

        let records = scan_content(&file(), "  <b>x</b> <b>y</b>\nnone\n<b>", &rules);
        let positions: Vec<(usize, usize)> =
            records.iter().map(|r| (r.line_number, r.column)).collect();
        assert_eq!(positions, vec![(1, 3), (1, 12), (3, 1)]);
        assert_eq!(records[0].line_text, "<b>x</b> <b>y</b>");
    }

    #[test]
    fn test_multiline_match_reports_start_line() {
        let epic = EpicDefinition::new(
            "blocks",
            Some("templates".into()),
            vec![rule(r"\{% block \w+ %\}\s*\{% endblock", true)],
        );
        let rules = [ApplicableRule {
            epic_index: 0,
            epic: &epic,
            rule: &epic.rules()[0],
        }];

        let content = "<html>\n  {% block body %}\n  {% endblock %}\n";
        let records = scan_content(&file(), content, &rules);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].line_number, 2);
        assert_eq!(records[0].column, 3);
        assert_eq!(records[0].matched_text, "{% block body %}\n  {% endblock");
        assert_eq!(records[0].component.as_deref(), Some("templates"));
    }

    #[test]
    fn test_overlapping_rules_count_independently() {
        let epic = EpicDefinition::new("imports", None, vec![rule("import", false), rule("imp", false)]);
        let rules: Vec<ApplicableRule<'_>> = epic
            .rules()
            .iter()
            .map(|r| ApplicableRule {
                epic_index: 0,
                epic: &epic,
                rule: r,
            })
            .collect();

        let records = scan_content(&file(), "x\nimport y", &rules);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].matched_text, "import");
        assert_eq!(records[1].matched_text, "imp");
    }

    #[test]
    fn test_line_anchors_agree_across_modes_on_crlf_content() {
        let content = "the end\r\nthe end\r\n";
        let count = |multiline: bool| {
            let epic = EpicDefinition::new("endings", None, vec![rule("end$", multiline)]);
            let rules = [ApplicableRule {
                epic_index: 0,
                epic: &epic,
                rule: &epic.rules()[0],
            }];
            scan_content(&file(), content, &rules)
                .iter()
                .map(|r| (r.line_number, r.column))
                .collect::<Vec<_>>()
        };

        assert_eq!(count(false), vec![(1, 5), (2, 5)]);
        assert_eq!(count(true), count(false));
    }

    #[test]
    fn test_named_groups_are_captured() {
        let epic = EpicDefinition::new("classes", None, vec![rule(r"class (?P<name>\w+)", false)]);
        let rules = [ApplicableRule {
            epic_index: 0,
            epic: &epic,
            rule: &epic.rules()[0],
        }];
        let records = scan_content(&file(), "class Foo:", &rules);
        assert_eq!(records[0].groups.get("name").map(String::as_str), Some("Foo"));
    }
}
