use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use tracing::info;

use crate::{
    cab_map::CabMap,
    container::{ContainerFormat, EntryInspector},
    game::Game,
};

/// Collect corpus files for `game` from a single archive file or a folder
/// walked recursively for the game's archive extensions
pub fn collect_corpus_files(input: &Path, game: &Game) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    ensure!(input.is_dir(), "Input path doesn't exist: {}", input.display());

    let mut files = Vec::new();
    for extension in game.extensions {
        let pattern = format!("{}/**/*.{}", input.display(), extension);
        for path in glob::glob(&pattern).context("Failed to build glob pattern")? {
            files.push(path.context("Failed to walk input folder")?);
        }
    }
    // Deterministic input order; the builder keeps whatever order it is given
    files.sort();
    Ok(files)
}

/// Build the CAB map for `game` over `input` and persist it under `maps_dir`
pub fn build_map(
    input: &Path,
    game: &Game,
    maps_dir: &Path,
    format: &(dyn ContainerFormat + Sync),
    inspector: &(dyn EntryInspector + Sync),
) -> Result<()> {
    let files = collect_corpus_files(input, game)?;
    ensure!(
        !files.is_empty(),
        "No {} archive files found under {}",
        game.display_name,
        input.display()
    );

    let (map, report) = CabMap::build(&files, game, format, inspector)?;

    let path = CabMap::map_path(maps_dir, game);
    map.save(&path)?;
    info!(
        "Saved {} entries from {} files to {} ({} collisions)",
        report.entries,
        report.files,
        path.display(),
        report.collisions
    );
    Ok(())
}
