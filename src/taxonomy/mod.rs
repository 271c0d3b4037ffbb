//! The taxonomy model: epics and the pattern rules that classify code into them.
//!
//! A [`Taxonomy`] is built once per run by the [`loader`] and is immutable
//! afterwards. It is shared by reference with every scanner, so no
//! synchronization is needed.

pub mod fragments;
pub mod loader;
pub mod rule;

pub use loader::{load_taxonomy, parse_taxonomy, DocumentFormat};
pub use rule::{GlobFilter, PatternRule, RuleOptions};

use crate::errors::DefinitionError;

/// One classification category and its ordered rules.
#[derive(Debug, Clone)]
pub struct EpicDefinition {
    name: String,
    component: Option<String>,
    rules: Vec<PatternRule>,
}

impl EpicDefinition {
    pub fn new(name: impl Into<String>, component: Option<String>, rules: Vec<PatternRule>) -> Self {
        Self {
            name: name.into(),
            component,
            rules,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Command-line friendly key: lower case, spaces to dashes, and `.`,
    /// `(`, `)` removed. `"GOV.UK Frontend (v2)"` becomes `govuk-frontend-v2`.
    pub fn key(&self) -> String {
        epic_key(&self.name)
    }
}

pub fn epic_key(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '.' | '(' | ')'))
        .map(|c| if c == ' ' { '-' } else { c })
        .collect()
}

/// Ordered, validated collection of epics.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    epics: Vec<EpicDefinition>,
}

impl Taxonomy {
    /// Build a taxonomy, rejecting duplicate epic names.
    pub fn new(epics: Vec<EpicDefinition>) -> Result<Self, DefinitionError> {
        let mut seen = std::collections::HashSet::new();
        let duplicates: Vec<DefinitionError> = epics
            .iter()
            .filter(|epic| !seen.insert(epic.name()))
            .map(|epic| DefinitionError::DuplicateEpic {
                name: epic.name().to_string(),
            })
            .collect();

        match DefinitionError::from_many(duplicates) {
            Some(err) => Err(err),
            None => Ok(Self { epics }),
        }
    }

    pub fn epics(&self) -> &[EpicDefinition] {
        &self.epics
    }

    pub fn len(&self) -> usize {
        self.epics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epics.is_empty()
    }

    /// Look an epic up by exact name or by [`EpicDefinition::key`].
    pub fn find(&self, name: &str) -> Option<usize> {
        self.epics
            .iter()
            .position(|epic| epic.name() == name)
            .or_else(|| {
                let key = epic_key(name);
                self.epics.iter().position(|epic| epic.key() == key)
            })
    }

    /// Every epic, in declaration order.
    pub fn select_all(&self) -> EpicSelection<'_> {
        EpicSelection {
            taxonomy: self,
            indices: (0..self.epics.len()).collect(),
        }
    }

    /// Restrict a run to the named epics.
    ///
    /// Names are matched exactly or by key; `all` selects everything and an
    /// empty list also selects everything. The selection keeps declaration
    /// order regardless of the order names were given in. Already-validated
    /// rules are reused as is.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<EpicSelection<'_>, DefinitionError> {
        if names.is_empty() || names.iter().any(|n| n.as_ref() == "all") {
            return Ok(self.select_all());
        }

        let mut chosen = vec![false; self.epics.len()];
        for name in names {
            let name = name.as_ref();
            match self.find(name) {
                Some(index) => chosen[index] = true,
                None => {
                    return Err(DefinitionError::UnknownEpic {
                        name: name.to_string(),
                        available: self.available_keys(),
                    })
                }
            }
        }

        Ok(EpicSelection {
            taxonomy: self,
            indices: chosen
                .iter()
                .enumerate()
                .filter_map(|(i, &on)| on.then_some(i))
                .collect(),
        })
    }

    fn available_keys(&self) -> String {
        let mut keys: Vec<String> = self.epics.iter().map(EpicDefinition::key).collect();
        keys.push("all".to_string());
        keys.join(", ")
    }
}

/// A subset of a taxonomy's epics, in declaration order.
#[derive(Debug, Clone)]
pub struct EpicSelection<'t> {
    taxonomy: &'t Taxonomy,
    indices: Vec<usize>,
}

impl<'t> EpicSelection<'t> {
    pub fn taxonomy(&self) -> &'t Taxonomy {
        self.taxonomy
    }

    /// Selected epics paired with their declaration index.
    pub fn epics(&self) -> impl Iterator<Item = (usize, &'t EpicDefinition)> + '_ {
        let epics = self.taxonomy.epics();
        self.indices.iter().map(move |&i| (i, &epics[i]))
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }
}
