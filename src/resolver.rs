//! Transitive dependency resolution over a built CAB map.
//!
//! Resolution answers one question: given some requested archive files,
//! which physical files and container offsets must be read so every
//! declared dependency of every matched content block is available.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    path::Path,
};

use tracing::{info, warn};

use crate::{cab_map::CabMap, game::Game};

/// Physical read set for one resolution session: file path -> container
/// start offsets that must be read from it.
///
/// The state is cumulative: repeated calls into the resolver keep adding to
/// it, which is what a multi-request session wants. Callers own the
/// lifecycle and call [`reset`](Self::reset) between unrelated sessions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolutionState {
    offsets: BTreeMap<String, BTreeSet<u64>>,
}

impl ResolutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything accumulated so far
    pub fn reset(&mut self) {
        self.offsets.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Ensure a (possibly empty) offset set exists for `path`
    pub fn touch(&mut self, path: &str) {
        self.offsets.entry(path.to_string()).or_default();
    }

    pub fn add(&mut self, path: &str, offset: u64) {
        self.offsets.entry(path.to_string()).or_default().insert(offset);
    }

    /// Files in the read set, in ascending path order
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.offsets.keys().map(String::as_str)
    }

    /// Offsets recorded for one file
    pub fn offsets(&self, path: &str) -> Option<&BTreeSet<u64>> {
        self.offsets.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<u64>)> {
        self.offsets.iter().map(|(path, offsets)| (path.as_str(), offsets))
    }
}

impl CabMap {
    /// All identifiers whose source path contains `query` as a substring,
    /// in ascending identifier order. Deliberately permissive: a path
    /// suffix matches every source file sharing it, and several matches
    /// are expected rather than an error.
    pub fn find_by_path(&self, query: &str) -> Vec<&str> {
        self.iter()
            .filter(|(_, entry)| entry.source_path.contains(query))
            .map(|(cab, _)| cab.as_str())
            .collect()
    }

    /// Add the location of `cab` and of everything it transitively depends
    /// on to `state`. Identifiers missing from the map contribute nothing.
    /// Cyclic or self-referential dependency declarations terminate; each
    /// identifier is visited once.
    pub fn accumulate(&self, cab: &str, state: &mut ResolutionState) {
        let mut pending = vec![cab];
        let mut visited = HashSet::new();

        while let Some(id) = pending.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(entry) = self.get(id) {
                state.add(&entry.source_path, entry.offset);
                pending.extend(entry.dependencies.iter().map(String::as_str));
            }
        }
    }

    /// Expand requested files to the full set needed to satisfy their
    /// dependencies: every requested path gets a (possibly empty) read-set
    /// entry, every identifier stored under a matching source path is
    /// accumulated, and the result is the originals followed by every file
    /// in the read set. The order of the discovered tail is not part of
    /// the contract. Skipped entirely when the map is empty.
    pub fn expand(&self, requested: &[String], state: &mut ResolutionState) -> Vec<String> {
        if self.is_empty() {
            warn!("CAB map is not built, skip resolving dependencies");
            return requested.to_vec();
        }

        for file in requested {
            state.touch(file);
            for cab in self.find_by_path(file) {
                self.accumulate(cab, state);
            }
        }

        let mut expanded = requested.to_vec();
        expanded.extend(state.files().map(str::to_string));
        expanded
    }

    /// Gated expansion for a batch request: only archive-shaped input is
    /// worth resolving, so the request passes through unchanged unless the
    /// first file carries one of the active game's archive extensions.
    pub fn resolve_dependencies(
        &self,
        requested: &[String],
        game: &Game,
        state: &mut ResolutionState,
    ) -> Vec<String> {
        if self.is_empty() {
            warn!("CAB map is not built, skip resolving dependencies");
            return requested.to_vec();
        }

        let archive_shaped = requested
            .first()
            .is_some_and(|file| game.matches_extension(Path::new(file)));
        if !archive_shaped {
            return requested.to_vec();
        }

        info!("Resolving dependencies");
        self.expand(requested, state)
    }
}

#[cfg(test)]
mod tests {
    use super::ResolutionState;
    use crate::cab_map::{CabMap, MapEntry};
    use crate::game::get_game;

    fn entry(source_path: &str, offset: u64, dependencies: &[&str]) -> MapEntry {
        MapEntry {
            source_path: source_path.to_string(),
            offset,
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn map_of(entries: &[(&str, MapEntry)]) -> CabMap {
        let mut map = CabMap::new();
        for (cab, e) in entries {
            map.insert(cab.to_string(), e.clone());
        }
        map
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_accumulate_absent_leaves_state_unchanged() {
        let map = map_of(&[("cab_a", entry("f1", 0, &[]))]);
        let mut state = ResolutionState::new();
        map.accumulate("cab_missing", &mut state);
        assert!(state.is_empty());
    }

    #[test]
    fn test_accumulate_no_deps_adds_one_pair() {
        let map = map_of(&[("cab_a", entry("f1", 64, &[]))]);
        let mut state = ResolutionState::new();
        map.accumulate("cab_a", &mut state);

        assert_eq!(state.files().collect::<Vec<_>>(), vec!["f1"]);
        assert_eq!(
            state.offsets("f1").unwrap().iter().copied().collect::<Vec<_>>(),
            vec![64]
        );
    }

    #[test]
    fn test_accumulate_chain_adds_all_three() {
        let map = map_of(&[
            ("cab_a", entry("f1", 0, &["cab_b"])),
            ("cab_b", entry("f2", 128, &["cab_c"])),
            ("cab_c", entry("f3", 256, &[])),
        ]);
        let mut state = ResolutionState::new();
        map.accumulate("cab_a", &mut state);

        assert_eq!(state.files().collect::<Vec<_>>(), vec!["f1", "f2", "f3"]);
    }

    #[test]
    fn test_accumulate_missing_dependency_is_ignored() {
        let map = map_of(&[("cab_a", entry("f1", 0, &["cab_gone"]))]);
        let mut state = ResolutionState::new();
        map.accumulate("cab_a", &mut state);

        assert_eq!(state.files().collect::<Vec<_>>(), vec!["f1"]);
    }

    #[test]
    fn test_accumulate_cycle_terminates() {
        let map = map_of(&[
            ("cab_a", entry("f1", 0, &["cab_b"])),
            ("cab_b", entry("f2", 128, &["cab_a"])),
        ]);
        let mut state = ResolutionState::new();
        map.accumulate("cab_a", &mut state);

        assert_eq!(state.files().collect::<Vec<_>>(), vec!["f1", "f2"]);
    }

    #[test]
    fn test_accumulate_self_reference_terminates() {
        let map = map_of(&[("cab_a", entry("f1", 0, &["cab_a"]))]);
        let mut state = ResolutionState::new();
        map.accumulate("cab_a", &mut state);

        assert_eq!(state.files().collect::<Vec<_>>(), vec!["f1"]);
    }

    #[test]
    fn test_find_by_path_matches_substring() {
        let map = map_of(&[
            ("cab_a", entry("archives/data_01.pak", 0, &[])),
            ("cab_b", entry("archives/data_011.pak", 0, &[])),
            ("cab_c", entry("archives/other.pak", 0, &[])),
        ]);

        // Substring matching is intentionally ambiguous: both data_01 files match
        assert_eq!(map.find_by_path("data_01"), vec!["cab_a", "cab_b"]);
        assert_eq!(map.find_by_path("data_011"), vec!["cab_b"]);
        assert!(map.find_by_path("nothing").is_empty());
    }

    #[test]
    fn test_expand_empty_map_returns_input_unchanged() {
        let map = CabMap::new();
        let mut state = ResolutionState::new();
        let expanded = map.expand(&strings(&["a.pak"]), &mut state);

        assert_eq!(expanded, strings(&["a.pak"]));
        assert!(state.is_empty());
    }

    #[test]
    fn test_expand_scenario() {
        let map = map_of(&[
            ("cab_x", entry("f1", 0, &["cab_y"])),
            ("cab_y", entry("f2", 128, &[])),
        ]);
        assert_eq!(map.find_by_path("f1"), vec!["cab_x"]);

        let mut state = ResolutionState::new();
        let expanded = map.expand(&strings(&["f1"]), &mut state);

        // Originals first, then every file in the read set (originals again)
        assert_eq!(expanded, strings(&["f1", "f1", "f2"]));
        assert_eq!(
            state.offsets("f1").unwrap().iter().copied().collect::<Vec<_>>(),
            vec![0]
        );
        assert_eq!(
            state.offsets("f2").unwrap().iter().copied().collect::<Vec<_>>(),
            vec![128]
        );
    }

    #[test]
    fn test_expand_unmatched_file_still_enters_read_set() {
        let map = map_of(&[("cab_a", entry("f1", 0, &[]))]);
        let mut state = ResolutionState::new();
        let expanded = map.expand(&strings(&["unrelated"]), &mut state);

        assert_eq!(expanded, strings(&["unrelated", "unrelated"]));
        assert!(state.offsets("unrelated").unwrap().is_empty());
    }

    #[test]
    fn test_state_accumulates_across_calls_until_reset() {
        let map = map_of(&[
            ("cab_a", entry("f1", 0, &[])),
            ("cab_b", entry("f2", 128, &[])),
        ]);
        let mut state = ResolutionState::new();

        map.expand(&strings(&["f1"]), &mut state);
        let expanded = map.expand(&strings(&["f2"]), &mut state);
        // f1 is still in the read set from the earlier call
        assert_eq!(expanded, strings(&["f2", "f1", "f2"]));

        state.reset();
        assert!(state.is_empty());
        let expanded = map.expand(&strings(&["f2"]), &mut state);
        assert_eq!(expanded, strings(&["f2", "f2"]));
    }

    #[test]
    fn test_resolve_dependencies_gates_on_extension() {
        let game = get_game("bh3").unwrap();
        let map = map_of(&[("cab_a", entry("archives/data_01.wmv", 0, &[]))]);

        let mut state = ResolutionState::new();
        let unchanged =
            map.resolve_dependencies(&strings(&["notes.txt"]), game, &mut state);
        assert_eq!(unchanged, strings(&["notes.txt"]));
        assert!(state.is_empty());

        let expanded =
            map.resolve_dependencies(&strings(&["archives/data_01.wmv"]), game, &mut state);
        assert_eq!(
            expanded,
            strings(&["archives/data_01.wmv", "archives/data_01.wmv"])
        );
    }

    #[test]
    fn test_resolve_dependencies_empty_request_passes_through() {
        let game = get_game("bh3").unwrap();
        let map = map_of(&[("cab_a", entry("f1", 0, &[]))]);
        let mut state = ResolutionState::new();
        assert!(map.resolve_dependencies(&[], game, &mut state).is_empty());
    }
}
