use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};

use crate::cab_map::CabMap;

/// Print every identifier stored under a source path containing `query`
pub fn find_cabs(map: &CabMap, query: &str) -> Result<()> {
    let mut stdout = BufWriter::new(io::stdout().lock());

    for cab in map.find_by_path(query) {
        writeln!(stdout, "{}", cab).context("Failed to write to stdout")?;
    }

    stdout.flush().context("Failed to flush stdout")
}
