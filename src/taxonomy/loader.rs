//! Taxonomy loading and validation.
//!
//! The loader is a pure transform from document text to a [`Taxonomy`]: it
//! validates every epic and every rule, collecting all problems, and only
//! returns a taxonomy when the whole definition is valid.

use super::fragments::{self, FragmentCycle};
use super::rule::{GlobFilter, PatternRule, RuleOptions};
use super::{EpicDefinition, Taxonomy};
use crate::errors::DefinitionError;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Serialization of a taxonomy document, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Toml,
    Yaml,
    Json,
}

impl DocumentFormat {
    /// `.yaml`/`.yml` and `.json` are recognized; anything else is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => Self::Yaml,
            Some("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTaxonomy {
    #[serde(default, rename = "epic", alias = "epics")]
    epics: Vec<RawEpic>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEpic {
    name: Option<String>,
    component: Option<String>,
    #[serde(default, alias = "glob")]
    globs: Option<OneOrMany>,
    #[serde(default)]
    fragments: BTreeMap<String, String>,
    #[serde(default, rename = "rule", alias = "rules")]
    rules: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    expression: Option<String>,
    #[serde(default, alias = "glob")]
    globs: Option<OneOrMany>,
    #[serde(default = "default_case_sensitive")]
    case_sensitive: bool,
    #[serde(default)]
    multiline: bool,
}

fn default_case_sensitive() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(glob) => vec![glob],
            Self::Many(globs) => globs,
        }
    }
}

/// Read and validate a taxonomy file.
pub fn load_taxonomy(path: &Path) -> Result<Taxonomy, DefinitionError> {
    let contents = fs::read_to_string(path).map_err(|source| DefinitionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let taxonomy = parse_taxonomy(&contents, DocumentFormat::from_path(path), path)?;
    log::info!(
        "Loaded {} epics from {}",
        taxonomy.len(),
        path.display()
    );
    Ok(taxonomy)
}

/// Parse and validate taxonomy text. `origin` is only used in messages.
pub fn parse_taxonomy(
    contents: &str,
    format: DocumentFormat,
    origin: &Path,
) -> Result<Taxonomy, DefinitionError> {
    let raw = deserialize(contents, format).map_err(|message| DefinitionError::Parse {
        path: origin.to_path_buf(),
        message,
    })?;
    build_taxonomy(raw)
}

fn deserialize(contents: &str, format: DocumentFormat) -> Result<RawTaxonomy, String> {
    match format {
        DocumentFormat::Toml => toml::from_str(contents).map_err(|e| e.to_string()),
        DocumentFormat::Yaml => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
        DocumentFormat::Json => serde_json::from_str(contents).map_err(|e| e.to_string()),
    }
}

fn build_taxonomy(raw: RawTaxonomy) -> Result<Taxonomy, DefinitionError> {
    let mut errors = Vec::new();
    let mut epics = Vec::with_capacity(raw.epics.len());
    let mut seen = HashSet::new();

    for (index, raw_epic) in raw.epics.into_iter().enumerate() {
        if let Some(name) = raw_epic.name.as_deref() {
            if !name.is_empty() && !seen.insert(name.to_string()) {
                errors.push(DefinitionError::DuplicateEpic {
                    name: name.to_string(),
                });
            }
        }
        match build_epic(index, raw_epic) {
            Ok(epic) => epics.push(epic),
            Err(mut problems) => errors.append(&mut problems),
        }
    }

    if let Some(err) = DefinitionError::from_many(errors) {
        return Err(err);
    }
    Taxonomy::new(epics)
}

fn build_epic(index: usize, raw: RawEpic) -> Result<EpicDefinition, Vec<DefinitionError>> {
    let name = match raw.name {
        Some(name) if !name.trim().is_empty() => name,
        _ => return Err(vec![DefinitionError::EmptyName { index: index + 1 }]),
    };

    if raw.rules.is_empty() {
        return Err(vec![DefinitionError::MissingField {
            epic: name,
            field: "rule",
        }]);
    }

    let epic_globs = raw.globs.map(OneOrMany::into_vec).unwrap_or_default();
    let mut errors = Vec::new();
    let mut rules = Vec::with_capacity(raw.rules.len());

    for (rule_index, raw_rule) in raw.rules.into_iter().enumerate() {
        match build_rule(&name, rule_index + 1, raw_rule, &epic_globs, &raw.fragments) {
            Ok(rule) => rules.push(rule),
            Err(err) => errors.push(err),
        }
    }

    if errors.is_empty() {
        log::debug!("Compiled {} rules for epic '{}'", rules.len(), name);
        let component = raw.component.filter(|c| !c.is_empty());
        Ok(EpicDefinition::new(name, component, rules))
    } else {
        Err(errors)
    }
}

fn build_rule(
    epic: &str,
    rule: usize,
    raw: RawRule,
    epic_globs: &[String],
    fragments_table: &BTreeMap<String, String>,
) -> Result<PatternRule, DefinitionError> {
    let expression = match raw.expression {
        Some(expression) if !expression.is_empty() => expression,
        _ => {
            return Err(DefinitionError::MissingField {
                epic: epic.to_string(),
                field: "expression",
            })
        }
    };

    let globs = raw
        .globs
        .map(OneOrMany::into_vec)
        .unwrap_or_else(|| epic_globs.to_vec());
    let filter = GlobFilter::new(&globs).map_err(|(glob, reason)| DefinitionError::InvalidGlob {
        epic: epic.to_string(),
        rule,
        glob,
        reason,
    })?;

    let expanded = fragments::expand(&expression, fragments_table).map_err(
        |FragmentCycle { fragment }| DefinitionError::FragmentCycle {
            epic: epic.to_string(),
            fragment,
        },
    )?;

    let options = RuleOptions {
        case_sensitive: raw.case_sensitive,
        multiline: raw.multiline,
    };

    PatternRule::compile(expression.clone(), &expanded, filter, options).map_err(|e| {
        DefinitionError::InvalidExpression {
            epic: epic.to_string(),
            rule,
            expression,
            reason: e.to_string(),
        }
    })
}

/// Path used in messages when a taxonomy is parsed from memory.
pub fn inline_origin() -> PathBuf {
    PathBuf::from("<inline>")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Taxonomy, DefinitionError> {
        parse_taxonomy(text, DocumentFormat::Toml, &inline_origin())
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("t.yml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("t.YAML")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("t.json")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("taxonomy")), DocumentFormat::Toml);
    }

    #[test]
    fn test_loads_epics_in_order() {
        let taxonomy = parse(
            r#"
            [[epic]]
            name = "templates"
            component = "frontend"
            [[epic.rule]]
            expression = '\{% include'

            [[epic]]
            name = "forms"
            [[epic.rule]]
            expression = "<form"
            glob = "*.html"
            case_sensitive = false
            "#,
        )
        .unwrap();

        let names: Vec<&str> = taxonomy.epics().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["templates", "forms"]);
        assert_eq!(taxonomy.epics()[0].component(), Some("frontend"));
        assert_eq!(taxonomy.epics()[1].component(), None);
        assert!(!taxonomy.epics()[1].rules()[0].is_case_sensitive());
    }

    #[test]
    fn test_epic_globs_are_inherited() {
        let taxonomy = parse(
            r#"
            [[epic]]
            name = "python"
            globs = ["*.py"]
            [[epic.rule]]
            expression = "def "
            [[epic.rule]]
            expression = "class "
            globs = ["*.pyi"]
            "#,
        )
        .unwrap();
        let rules = taxonomy.epics()[0].rules();
        assert!(rules[0].applies_to(Path::new("a/b.py")));
        assert!(!rules[1].applies_to(Path::new("a/b.py")));
        assert!(rules[1].applies_to(Path::new("a/b.pyi")));
    }

    #[test]
    fn test_all_problems_reported_together() {
        let err = parse(
            r#"
            [[epic]]
            name = "forms"
            [[epic.rule]]
            expression = "(unclosed"

            [[epic]]
            name = "forms"
            [[epic.rule]]
            expression = "ok"

            [[epic]]
            name = "empty"
            "#,
        )
        .unwrap_err();

        let problems: Vec<String> = err.problems().map(|p| p.to_string()).collect();
        assert_eq!(problems.len(), 3, "{problems:?}");
        assert!(problems.iter().any(|p| p.contains("invalid expression")));
        assert!(problems.iter().any(|p| p.contains("duplicate epic name 'forms'")));
        assert!(problems
            .iter()
            .any(|p| p.contains("'empty' is missing required field 'rule'")));
    }

    #[test]
    fn test_missing_expression_names_epic() {
        let err = parse(
            r#"
            [[epic]]
            name = "macros"
            [[epic.rule]]
            glob = "*.html"
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DefinitionError::MissingField { ref epic, field: "expression" } if epic == "macros"
        ));
    }

    #[test]
    fn test_unknown_field_is_malformed() {
        let err = parse(
            r#"
            [[epic]]
            name = "x"
            colour = "red"
            [[epic.rule]]
            expression = "x"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::Parse { .. }));
    }

    #[test]
    fn test_fragment_cycle_is_definition_error() {
        let err = parse(
            r#"
            [[epic]]
            name = "loop"
            fragments = { a = "{b}", b = "{a}" }
            [[epic.rule]]
            expression = "{a}"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::FragmentCycle { .. }));
    }

    #[test]
    fn test_yaml_document() {
        let taxonomy = parse_taxonomy(
            "epics:\n  - name: macros\n    fragments:\n      from: \"[^'\\\"]+\"\n    rules:\n      - expression: \"import '{from}'\"\n",
            DocumentFormat::Yaml,
            &inline_origin(),
        )
        .unwrap();
        let rule = &taxonomy.epics()[0].rules()[0];
        assert_eq!(rule.source(), "import '{from}'");
        assert!(rule.regex().is_match("import 'toolkit/forms'"));
    }

    #[test]
    fn test_json_document() {
        let taxonomy = parse_taxonomy(
            r#"{"epics": [{"name": "a", "rules": [{"expression": "x", "multiline": true}]}]}"#,
            DocumentFormat::Json,
            &inline_origin(),
        )
        .unwrap();
        assert!(taxonomy.epics()[0].rules()[0].is_multiline());
    }
}
