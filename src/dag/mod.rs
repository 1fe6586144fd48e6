// src/dag/mod.rs

//! Action graph representation and structural checks.
//!
//! - [`graph`] holds [`ActionGraph`], the registry of actions and edges.
//! - [`validate`] checks references and finds cycles (with their path).
//! - [`closure`] answers ancestor/descendant and topological-order queries.

pub mod closure;
pub mod graph;
pub mod validate;

pub use graph::ActionGraph;
