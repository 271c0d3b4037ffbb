//! Named fragment expansion for rule expressions.
//!
//! An epic may declare reusable sub-expressions:
//!
//! ```toml
//! [epic.fragments]
//! macro = "[^'\"]+"
//! ```
//!
//! and a rule expression refers to them as `{macro}`. The first reference is
//! wrapped in a named capture group so matches can report what each fragment
//! captured; later references to the same name are non-capturing, since a
//! regex may only declare a group name once.
//!
//! Braces that do not enclose a declared fragment name are left alone, so
//! repetitions such as `\d{2,4}` and literal `\{` keep their meaning.

use std::collections::{BTreeMap, HashSet};

/// A fragment whose expansion refers back to itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentCycle {
    pub fragment: String,
}

/// Expand `{name}` references in `expression` using `fragments`.
pub fn expand(
    expression: &str,
    fragments: &BTreeMap<String, String>,
) -> Result<String, FragmentCycle> {
    let mut expander = Expander {
        fragments,
        captured: HashSet::new(),
        stack: Vec::new(),
    };
    expander.expand(expression)
}

struct Expander<'a> {
    fragments: &'a BTreeMap<String, String>,
    captured: HashSet<String>,
    stack: Vec<String>,
}

impl Expander<'_> {
    fn expand(&mut self, expression: &str) -> Result<String, FragmentCycle> {
        let mut out = String::with_capacity(expression.len());
        let mut rest = expression;

        while let Some(ch) = rest.chars().next() {
            match ch {
                '\\' => {
                    // keep the escape and whatever it escapes
                    let escaped_len = rest[1..].chars().next().map_or(0, char::len_utf8);
                    out.push_str(&rest[..1 + escaped_len]);
                    rest = &rest[1 + escaped_len..];
                }
                '{' => match self.reference_at(rest) {
                    Some((name, len)) => {
                        let expanded = self.expand_fragment(name)?;
                        out.push_str(&expanded);
                        rest = &rest[len..];
                    }
                    None => {
                        out.push('{');
                        rest = &rest[1..];
                    }
                },
                _ => {
                    out.push(ch);
                    rest = &rest[ch.len_utf8()..];
                }
            }
        }

        Ok(out)
    }

    /// Returns the fragment name and the length of `{name}` when `text`
    /// starts with a reference to a declared fragment.
    fn reference_at<'t>(&self, text: &'t str) -> Option<(&'t str, usize)> {
        let close = text.find('}')?;
        let name = &text[1..close];
        if is_identifier(name) && self.fragments.contains_key(name) {
            Some((name, close + 1))
        } else {
            None
        }
    }

    fn expand_fragment(&mut self, name: &str) -> Result<String, FragmentCycle> {
        if self.stack.iter().any(|open| open == name) {
            return Err(FragmentCycle {
                fragment: name.to_string(),
            });
        }
        let body = match self.fragments.get(name) {
            Some(body) => body,
            None => return Ok(format!("{{{name}}}")),
        };

        self.stack.push(name.to_string());
        let inner = self.expand(body)?;
        self.stack.pop();

        if self.captured.insert(name.to_string()) {
            Ok(format!("(?P<{name}>{inner})"))
        } else {
            Ok(format!("(?:{inner})"))
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
