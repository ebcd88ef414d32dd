use std::path::PathBuf;

use anyhow::{bail, Result};
use cab_tools::{
    cab_map::CabMap,
    commands::{
        build::build_map, export::export_map, find::find_cabs, list::list_entries,
        resolve::resolve_files,
    },
    formats::raw::{RawBundleFormat, RawEntryInspector},
    game::{get_game, supported_games},
};
use clap::{Parser, Subcommand};
use glob::Pattern;
use tracing::Level;

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the CAB map from an archive file or folder
    Build {
        /// Archive file or folder to scan
        input: PathBuf,
    },
    /// Resolve the physical read set for the given archive files
    Resolve {
        /// Archive files to expand
        files: Vec<String>,
    },
    /// List identifiers in the map
    List {
        /// Glob pattern to filter the identifiers
        #[clap(default_value = "*")]
        glob: Pattern,
    },
    /// Find identifiers stored under source paths containing a substring
    Find {
        /// Source path substring to search for
        query: String,
    },
    /// Export the map as JSON
    Export {
        /// Path to write the JSON map to
        output: PathBuf,
    },
}

/// Builds and queries per-game CAB maps: which archive file and byte offset
/// holds each content block, and what it depends on.
#[derive(Parser, Debug)]
#[command(name = "cab_map")]
#[clap(version)]
struct Cli {
    /// Specify the game profile
    #[arg(long, short = 'g', required = true)]
    game: String,

    /// Folder holding the persisted maps (optional)
    #[arg(long)]
    maps_dir: Option<PathBuf>,

    /// Show debug log messages
    #[arg(long, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let Some(game) = get_game(&cli.game) else {
        bail!(
            "Invalid game {:?}. Supported games: {}",
            cli.game,
            supported_games()
        );
    };

    let maps_dir = cli.maps_dir.unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cab_tools/maps")
    });

    let format = RawBundleFormat;
    let inspector = RawEntryInspector;

    match cli.command {
        Command::Build { input } => build_map(&input, game, &maps_dir, &format, &inspector),
        Command::Resolve { files } => {
            let map = CabMap::load(&CabMap::map_path(&maps_dir, game));
            resolve_files(&map, game, &files)
        }
        Command::List { glob } => {
            let map = CabMap::load(&CabMap::map_path(&maps_dir, game));
            list_entries(&map, &glob)
        }
        Command::Find { query } => {
            let map = CabMap::load(&CabMap::map_path(&maps_dir, game));
            find_cabs(&map, &query)
        }
        Command::Export { output } => {
            let map = CabMap::load(&CabMap::map_path(&maps_dir, game));
            export_map(&map, &output)
        }
    }
}
