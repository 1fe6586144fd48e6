// src/errors.rs

//! Crate-wide error types.
//!
//! - [`GraphError`] covers structural problems (duplicate ids, unknown
//!   references, self edges, cycles) and operational ones (graph locked by a
//!   run, run already in progress). These surface synchronously to callers.
//! - [`ConfigError`] is used by the graph-file loader in [`crate::config`].
//!
//! Failures *inside* action bodies are not errors of the engine; they are
//! recorded per action in [`crate::engine::RunOutcome`].

use thiserror::Error;

use crate::action::ActionId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("action '{0}' is already registered")]
    DuplicateAction(ActionId),

    #[error("{}", unknown_action_message(.id, .referenced_by.as_ref()))]
    UnknownAction {
        id: ActionId,
        /// The action that declared the dependency, when the unknown id was
        /// found during validation rather than passed in directly.
        referenced_by: Option<ActionId>,
    },

    #[error("action '{0}' cannot depend on itself")]
    SelfDependency(ActionId),

    #[error("cycle detected in action graph: {}", format_path(.path))]
    CyclicGraph {
        /// Closed path in dependency order; first and last element are equal.
        path: Vec<ActionId>,
    },

    #[error("graph is locked while a run is active")]
    GraphLocked,

    #[error("a run is already in progress on this graph")]
    RunInProgress,
}

impl GraphError {
    pub fn unknown(id: impl Into<ActionId>) -> Self {
        Self::UnknownAction {
            id: id.into(),
            referenced_by: None,
        }
    }

    /// True for errors raised by graph shape (as opposed to run lifecycle).
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            GraphError::DuplicateAction(_)
                | GraphError::UnknownAction { .. }
                | GraphError::SelfDependency(_)
                | GraphError::CyclicGraph { .. }
        )
    }
}

fn unknown_action_message(id: &ActionId, referenced_by: Option<&ActionId>) -> String {
    match referenced_by {
        Some(owner) => format!("action '{owner}' depends on unknown action '{id}'"),
        None => format!("unknown action '{id}'"),
    }
}

fn format_path(path: &[ActionId]) -> String {
    path.iter()
        .map(ActionId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type Result<T> = std::result::Result<T, GraphError>;
