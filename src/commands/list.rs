use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use glob::Pattern;

use crate::cab_map::CabMap;

/// List identifiers in the map matching a glob pattern, with the location
/// each one resolves to
pub fn list_entries(map: &CabMap, pattern: &Pattern) -> Result<()> {
    // Use a buffered writer since maps can hold a lot of entries
    let mut stdout = BufWriter::new(io::stdout().lock());

    map.iter()
        .filter(|(cab, _)| pattern.matches(cab))
        .try_for_each(|(cab, entry)| {
            writeln!(stdout, "{}\t{}@{}", cab, entry.source_path, entry.offset)
                .context("Failed to write to stdout")
        })?;

    stdout.flush().context("Failed to flush stdout")
}
