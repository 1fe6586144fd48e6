#![allow(dead_code)]

use std::collections::BTreeMap;

use action_graph::config::{ActionConfig, GraphFile, RawGraphFile, RunSection};
use action_graph::{Action, ActionGraph, ActionValue, FailurePolicy, action_fn};
use serde_json::json;

/// Builder for `GraphFile` to simplify test setup.
pub struct GraphFileBuilder {
    raw: RawGraphFile,
}

impl GraphFileBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawGraphFile {
                run: RunSection::default(),
                action: BTreeMap::new(),
            },
        }
    }

    pub fn with_action(mut self, name: &str, action: ActionConfig) -> Self {
        self.raw.action.insert(name.to_string(), action);
        self
    }

    pub fn max_parallelism(mut self, n: usize) -> Self {
        self.raw.run.max_parallelism = n;
        self
    }

    pub fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.raw.run.on_failure = policy;
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.raw.run.timeout = Some(timeout.to_string());
        self
    }

    pub fn lenient(mut self, val: bool) -> Self {
        self.raw.run.lenient = val;
        self
    }

    pub fn build_raw(self) -> RawGraphFile {
        self.raw
    }

    pub fn build(self) -> GraphFile {
        GraphFile::try_from(self.raw).expect("Failed to build valid graph file from builder")
    }
}

impl Default for GraphFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ActionConfig`.
pub struct ActionConfigBuilder {
    action: ActionConfig,
}

impl ActionConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            action: ActionConfig {
                cmd: cmd.to_string(),
                after: vec![],
                priority: 0,
                skip_exit_code: None,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.action.after.push(dep.to_string());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.action.priority = priority;
        self
    }

    pub fn skip_exit_code(mut self, code: i32) -> Self {
        self.action.skip_exit_code = Some(code);
        self
    }

    pub fn build(self) -> ActionConfig {
        self.action
    }
}

/// Action that succeeds immediately with a fixed value.
pub fn value_action(id: &str, deps: &[&str], value: ActionValue) -> Action {
    Action::new(
        id,
        action_fn(move |_| {
            let value = value.clone();
            async move { Ok(value) }
        }),
    )
    .with_dependencies(deps.iter().copied())
}

/// Action that succeeds immediately with its own id as value.
pub fn noop_action(id: &str, deps: &[&str]) -> Action {
    value_action(id, deps, json!(id))
}

/// Builder for `ActionGraph` that panics on registration errors.
pub struct GraphBuilder {
    graph: ActionGraph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: ActionGraph::new(),
        }
    }

    pub fn action(self, action: Action) -> Self {
        self.graph
            .add_action(action)
            .expect("Failed to register action in builder");
        self
    }

    pub fn noop(self, id: &str, deps: &[&str]) -> Self {
        self.action(noop_action(id, deps))
    }

    pub fn build(self) -> ActionGraph {
        self.graph
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}
