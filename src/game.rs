//! Supported game profiles

use std::path::Path;

/// One supported game target: which archive extensions its bundles use and
/// which persisted map file belongs to it
#[derive(Debug)]
pub struct Game {
    pub name: &'static str,
    pub display_name: &'static str,
    /// Archive file extensions, without the leading dot
    pub extensions: &'static [&'static str],
    /// Filename stem of the persisted CAB map
    pub map_name: &'static str,
}

pub const GAMES: &[Game] = &[
    Game {
        name: "bh3",
        display_name: "Honkai Impact 3rd",
        extensions: &["wmv"],
        map_name: "BH3Map",
    },
    Game {
        name: "gi",
        display_name: "Genshin Impact",
        extensions: &["blk"],
        map_name: "GIMap",
    },
    Game {
        name: "unity",
        display_name: "Generic Unity",
        extensions: &["unity3d", "bundle", "ab"],
        map_name: "UnityMap",
    },
];

impl Game {
    /// Whether `path` carries one of this game's archive extensions
    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
    }
}

/// Look up a game profile by name
pub fn get_game(name: &str) -> Option<&'static Game> {
    GAMES.iter().find(|g| g.name.eq_ignore_ascii_case(name))
}

/// Human-readable list of supported games
pub fn supported_games() -> String {
    GAMES
        .iter()
        .map(|g| format!("{} ({})", g.name, g.display_name))
        .collect::<Vec<_>>()
        .join(", ")
}
