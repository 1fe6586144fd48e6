// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::action::{Action, DEFAULT_PRIORITY};
use crate::dag::ActionGraph;
use crate::engine::RunOptions;
use crate::errors::ConfigError;
use crate::exec::CommandAction;
use crate::types::{FailurePolicy, Parallelism};

/// Graph file as read from TOML, before validation.
///
/// ```toml
/// [run]
/// max_parallelism = 4
/// on_failure = "continue"
/// timeout = "30s"
///
/// [action.fetch]
/// cmd = "curl -sf https://example.com/data.json"
///
/// [action.build]
/// cmd = "make build"
/// after = ["fetch"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawGraphFile {
    /// Run options from `[run]`.
    #[serde(default)]
    pub run: RunSection,

    /// All actions from `[action.<name>]`, keyed by action id.
    #[serde(default)]
    pub action: BTreeMap<String, ActionConfig>,
}

/// `[run]` section. Every field can be overridden on the command line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    /// `0` (the default) means unbounded.
    #[serde(default)]
    pub max_parallelism: usize,

    /// `"fail-fast"` (default) or `"continue"`.
    #[serde(default)]
    pub on_failure: FailurePolicy,

    /// Duration string such as `"30s"`; no timeout when absent.
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub lenient: bool,
}

/// `[action.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionConfig {
    /// Shell command to execute.
    pub cmd: String,

    /// Actions that must succeed before this one starts.
    #[serde(default)]
    pub after: Vec<String>,

    /// Lower values are dispatched first among ready actions.
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Exit code meaning "nothing to do": the action ends Skipped instead
    /// of Failed.
    #[serde(default)]
    pub skip_exit_code: Option<i32>,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

/// A validated graph file.
///
/// Construct via `GraphFile::try_from(raw)` or
/// [`crate::config::load_and_validate`].
#[derive(Debug, Clone)]
pub struct GraphFile {
    pub run: RunSection,
    pub action: BTreeMap<String, ActionConfig>,
    timeout: Option<Duration>,
}

impl GraphFile {
    pub(crate) fn new_unchecked(
        run: RunSection,
        action: BTreeMap<String, ActionConfig>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            run,
            action,
            timeout,
        }
    }

    /// Parsed `[run].timeout`.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run options described by the `[run]` section.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            max_parallelism: Parallelism::from(self.run.max_parallelism),
            on_failure: self.run.on_failure,
            timeout: self.timeout,
            lenient: self.run.lenient,
        }
    }

    /// Build an [`ActionGraph`] with one [`CommandAction`] per action.
    ///
    /// The graph is validated before it is returned, so cycles surface here.
    pub fn build_graph(&self) -> Result<ActionGraph, ConfigError> {
        let graph = ActionGraph::new();

        for (name, cfg) in &self.action {
            let body = CommandAction::new(name.as_str(), cfg.cmd.as_str())
                .with_skip_exit_code(cfg.skip_exit_code);
            let action = Action::new(name.as_str(), body)
                .with_dependencies(cfg.after.iter().map(String::as_str))
                .with_priority(cfg.priority);
            graph.add_action(action)?;
        }

        graph.validate()?;
        debug!(actions = graph.len(), "built action graph from file");
        Ok(graph)
    }
}
