pub mod cab_map;
pub mod commands;
pub mod container;
pub mod formats;
pub mod game;
pub mod multi_bundle;
pub mod resolver;
