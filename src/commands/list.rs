use crate::taxonomy::Taxonomy;
use std::io::Write;

/// Write one line per epic: key, name, component and rule count, tab separated.
pub fn list_epics(taxonomy: &Taxonomy, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "key\tname\tcomponent\trules")?;
    for epic in taxonomy.epics() {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            epic.key(),
            epic.name(),
            epic.component().unwrap_or(""),
            epic.rules().len()
        )?;
    }
    Ok(())
}
