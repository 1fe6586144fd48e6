// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{GraphFile, RawGraphFile};
use crate::errors::ConfigError;

/// Load a graph file from a given path and return the raw `RawGraphFile`.
///
/// This only performs TOML deserialization; it does **not** check
/// references or the `[run]` section. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawGraphFile, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let raw: RawGraphFile = toml::from_str(&contents)?;
    debug!(path = %path.display(), actions = raw.action.len(), "loaded graph file");

    Ok(raw)
}

/// Load a graph file from path and validate it.
///
/// Checks for:
/// - at least one `[action.<name>]` section,
/// - unknown or self `after` references,
/// - a parseable `[run].timeout`.
///
/// Cycles are reported when the graph is built or run.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<GraphFile, ConfigError> {
    let raw = load_from_path(&path)?;
    GraphFile::try_from(raw)
}

/// `ActionGraph.toml` in the current working directory.
pub fn default_graph_path() -> PathBuf {
    PathBuf::from("ActionGraph.toml")
}
