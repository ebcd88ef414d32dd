use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cab_map::CabMap;

#[derive(Serialize)]
struct ExportEntry<'a> {
    cab: &'a str,
    source_path: &'a str,
    offset: u64,
    dependencies: &'a [String],
}

/// Dump the map as JSON for external tooling
pub fn export_map(map: &CabMap, output: &Path) -> Result<()> {
    let entries: Vec<ExportEntry> = map
        .iter()
        .map(|(cab, entry)| ExportEntry {
            cab,
            source_path: &entry.source_path,
            offset: entry.offset,
            dependencies: &entry.dependencies,
        })
        .collect();

    let json = serde_json::to_string_pretty(&entries).context("Failed to serialise map")?;
    fs::write(output, json).with_context(|| format!("Failed to write {}", output.display()))?;

    eprintln!("Exported {} entries to {}", map.len(), output.display());
    Ok(())
}
