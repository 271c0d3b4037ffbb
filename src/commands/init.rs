use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub const STARTER_TAXONOMY: &str = r#"# Code taxonomy
#
# Each [[epic]] is a category of code to find and track. Epics are reported
# in the order they are declared here.

[[epic]]
name = "Template includes"
component = "templates"
globs = ["*.html", "!tests/**"]

[[epic.rule]]
expression = '\{% include'

[[epic]]
name = "Toolkit macros"
component = "templates"
globs = ["*.html"]

# {macro} expands to the fragment below and is captured as a named group
[epic.fragments]
macro = '''[^'"]+'''

[[epic.rule]]
expression = '''\{% import ['"]toolkit/{macro}['"]'''

[[epic]]
name = "Python class declarations"
component = "backend"

[[epic.rule]]
expression = 'class \w+(\([^)]*\))?:'
glob = "*.py"

[[epic.rule]]
expression = 'TODO: migrate'
case_sensitive = false
"#;

/// Write a starter taxonomy to `path`.
pub fn init_taxonomy(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        );
    }

    fs::write(path, STARTER_TAXONOMY)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Created {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::load_taxonomy;
    use tempfile::TempDir;

    #[test]
    fn test_starter_taxonomy_is_valid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("taxonomy.toml");
        init_taxonomy(&path, false).unwrap();

        let taxonomy = load_taxonomy(&path).unwrap();
        assert_eq!(taxonomy.len(), 3);
        let macro_rule = &taxonomy.epics()[1].rules()[0];
        let caps = macro_rule
            .regex()
            .captures(r#"{% import "toolkit/forms.html" as forms %}"#)
            .unwrap();
        assert_eq!(&caps["macro"], "forms.html");
    }

    #[test]
    fn test_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("taxonomy.toml");
        fs::write(&path, "keep me").unwrap();

        assert!(init_taxonomy(&path, false).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me");

        init_taxonomy(&path, true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), STARTER_TAXONOMY);
    }
}
