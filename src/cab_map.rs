//! Persistent CAB map: content-block identifier -> physical location and
//! declared dependencies.
//!
//! Persisted layout, one file per game profile:
//!
//! ```text
//! entry_count      : i32 LE
//! repeat entry_count times:
//!   identifier     : string
//!   source_path    : string
//!   offset         : i64 LE
//!   dep_count      : i32 LE
//!   repeat dep_count times:
//!     dependency   : string
//! ```
//!
//! Strings are a u32 LE byte length followed by UTF-8. Entries are written
//! in ascending identifier order so rebuilds over the same corpus diff
//! cleanly. There is no version field; a format change requires a rebuild.

use std::{
    cmp::Ordering,
    collections::{btree_map, BTreeMap},
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering as AtomicOrdering},
};

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use nom::{
    bytes::complete::take,
    multi::count,
    number::complete::{le_i32, le_i64, le_u32},
    IResult,
};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{info, warn};

use crate::{
    container::{ContainerFormat, EntryInspector},
    game::Game,
    multi_bundle::split_bundles,
};

/// Physical location of one content block and the externals it declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    /// On-disk file holding the block's container
    pub source_path: String,
    /// Byte offset of the container start within `source_path`
    pub offset: u64,
    /// Identifiers this block declares as externals, in declaration order
    pub dependencies: Vec<String>,
}

impl Ord for MapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.source_path
            .cmp(&other.source_path)
            .then(self.offset.cmp(&other.offset))
            .then_with(|| self.dependencies.cmp(&other.dependencies))
    }
}

impl PartialOrd for MapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Outcome summary of one corpus scan
#[derive(Debug, Clone, Copy)]
pub struct BuildReport {
    pub files: usize,
    pub entries: usize,
    pub collisions: usize,
}

/// Mapping from content-block identifier to its location and dependencies.
/// Built once per corpus scan, persisted per game profile, and reloaded
/// cheaply afterwards. Identifier keys are unique: the first occurrence
/// seen during a build wins, later duplicates are dropped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CabMap {
    entries: BTreeMap<String, MapEntry>,
}

impl CabMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, cab: &str) -> Option<&MapEntry> {
        self.entries.get(cab)
    }

    /// Entries in ascending identifier order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &MapEntry)> {
        self.entries.iter()
    }

    /// Insert an entry unless its identifier is already present. Returns
    /// whether the entry was inserted; a `false` result is a collision.
    pub fn insert(&mut self, cab: String, entry: MapEntry) -> bool {
        match self.entries.entry(cab) {
            btree_map::Entry::Occupied(_) => false,
            btree_map::Entry::Vacant(vacant) => {
                vacant.insert(entry);
                true
            }
        }
    }

    /// Scan `files` and build a fresh map. Files are scanned in parallel
    /// but merged in input order, so the first occurrence of an identifier
    /// (in the caller's file order) wins and later duplicates only bump
    /// the collision count. Any I/O or parse error fails the whole build.
    pub fn build(
        files: &[PathBuf],
        game: &Game,
        format: &(dyn ContainerFormat + Sync),
        inspector: &(dyn EntryInspector + Sync),
    ) -> Result<(CabMap, BuildReport)> {
        info!("Building {}", game.map_name);
        let total = files.len();
        let processed = AtomicUsize::new(0);

        let scanned = files
            .par_iter()
            .map(|file| -> Result<Vec<(String, MapEntry)>> {
                let found = scan_file(file, format, inspector)
                    .with_context(|| format!("Failed to scan {}", file.display()))?;

                let done = processed.fetch_add(1, AtomicOrdering::Relaxed) + 1;
                let name = file.file_name().unwrap_or(file.as_os_str());
                info!("[{}/{}] Processed {}", done, total, name.to_string_lossy());

                Ok(found)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut map = CabMap::new();
        let mut collisions = 0;
        for (cab, entry) in scanned.into_iter().flatten() {
            if !map.insert(cab, entry) {
                collisions += 1;
            }
        }

        let report = BuildReport {
            files: total,
            entries: map.len(),
            collisions,
        };
        info!(
            "{} built successfully, {} collisions found",
            game.map_name, report.collisions
        );
        Ok((map, report))
    }

    /// Persist the map. The buffer is assembled fully in memory and written
    /// in a single call once the scan has already succeeded, so no partial
    /// map ever reaches disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.entries.len() as i32).to_le_bytes());
        for (cab, entry) in &self.entries {
            put_string(&mut buf, cab);
            put_string(&mut buf, &entry.source_path);
            buf.extend_from_slice(&(entry.offset as i64).to_le_bytes());
            buf.extend_from_slice(&(entry.dependencies.len() as i32).to_le_bytes());
            for dependency in &entry.dependencies {
                put_string(&mut buf, dependency);
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create map folder")?;
        }
        fs::write(path, &buf).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Read a persisted map file
    pub fn read(path: &Path) -> Result<CabMap> {
        let content = fs::read(path)
            .with_context(|| format!("Failed to read map file {}", path.display()))?;
        let (_, entries) = parse_map(&content)
            .map_err(|_| anyhow!("Failed to parse map file {}", path.display()))?;

        let mut map = CabMap::new();
        for (cab, entry) in entries {
            map.insert(cab, entry);
        }
        Ok(map)
    }

    /// Load a persisted map, falling back to an empty map when the file is
    /// missing or corrupt. Resolution over an empty map finds nothing, so
    /// callers degrade to scanning files directly.
    pub fn load(path: &Path) -> CabMap {
        match Self::read(path) {
            Ok(map) => {
                info!("Loaded {} ({} entries)", path.display(), map.len());
                map
            }
            Err(e) => {
                warn!("Map was not loaded, {:#}", e);
                CabMap::new()
            }
        }
    }

    /// Location of the persisted map for `game` under `maps_dir`
    pub fn map_path(maps_dir: &Path, game: &Game) -> PathBuf {
        maps_dir.join(format!("{}.bin", game.map_name))
    }
}

fn scan_file(
    file: &Path,
    format: &dyn ContainerFormat,
    inspector: &dyn EntryInspector,
) -> Result<Vec<(String, MapEntry)>> {
    let data = Bytes::from(
        fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?,
    );
    let source_path = file.display().to_string();

    let known_offsets = format.scan_offsets(&data).unwrap_or_default();
    let mut found = Vec::new();
    for item in split_bundles(&data, &known_offsets, format) {
        let (offset, container) = item?;
        for entry in container.entries {
            // Only serialized entries can declare externals; opaque blobs
            // are not indexed
            if !inspector.is_serialized(&entry.data) {
                continue;
            }
            let dependencies = inspector.external_dependencies(&entry.data)?;
            found.push((
                entry.path,
                MapEntry {
                    source_path: source_path.clone(),
                    offset,
                    dependencies,
                },
            ));
        }
    }
    Ok(found)
}

fn put_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

// Parser for a u32-length-prefixed UTF-8 string
fn parse_string(input: &[u8]) -> IResult<&[u8], String> {
    let (input, length) = le_u32(input)?;
    let (input, data) = take(length)(input)?;
    let string = String::from_utf8_lossy(data).to_string();
    Ok((input, string))
}

// Parser for one map entry
fn parse_map_entry(input: &[u8]) -> IResult<&[u8], (String, MapEntry)> {
    let (input, cab) = parse_string(input)?;
    let (input, source_path) = parse_string(input)?;
    let (input, offset) = le_i64(input)?;
    let (input, dep_count) = le_i32(input)?;
    let (input, dependencies) = count(parse_string, dep_count as usize)(input)?;
    Ok((
        input,
        (
            cab,
            MapEntry {
                source_path,
                offset: offset as u64,
                dependencies,
            },
        ),
    ))
}

// Parser for the entire persisted map
fn parse_map(input: &[u8]) -> IResult<&[u8], Vec<(String, MapEntry)>> {
    let (input, entry_count) = le_i32(input)?;
    count(parse_map_entry, entry_count as usize)(input)
}
