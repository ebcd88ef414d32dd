use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};

use crate::{cab_map::CabMap, game::Game, resolver::ResolutionState};

/// Expand the requested archive files and print the physical read set:
/// one line per file with the container offsets to read from it
pub fn resolve_files(map: &CabMap, game: &Game, files: &[String]) -> Result<()> {
    let mut state = ResolutionState::new();
    map.resolve_dependencies(files, game, &mut state);

    let mut stdout = BufWriter::new(io::stdout().lock());
    for (path, offsets) in state.iter() {
        let offsets = offsets
            .iter()
            .map(|o| o.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(stdout, "{}: [{}]", path, offsets).context("Failed to write to stdout")?;
    }

    stdout.flush().context("Failed to flush stdout")
}
