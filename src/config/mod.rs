// src/config/mod.rs

//! Graph files: TOML descriptions of an action graph for the binary.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a graph file from disk (`loader.rs`).
//! - Validate references, self edges and the `[run]` section (`validate.rs`).
//! - Parse duration strings such as `"30s"` (`duration.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_graph_path, load_and_validate, load_from_path};
pub use model::{ActionConfig, GraphFile, RawGraphFile, RunSection};
