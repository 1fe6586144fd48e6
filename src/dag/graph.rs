// src/dag/graph.rs

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::action::{Action, ActionBody, ActionId, ActionState};
use crate::dag::{closure, validate};
use crate::engine::context::PlannedAction;
use crate::engine::{ExecutionSnapshot, RunOptions, RunOutcome, Scheduler};
use crate::errors::{GraphError, Result};

/// Registered actions plus derived adjacency.
#[derive(Default)]
struct GraphData {
    actions: HashMap<ActionId, Action>,
    /// Registration order, used for deterministic iteration.
    order: Vec<ActionId>,
    /// Direct dependents of each id. Keys may name actions that are not
    /// registered yet, so late registration still finds its dependents.
    dependents: HashMap<ActionId, BTreeSet<ActionId>>,
    run_active: bool,
    run_counter: u64,
}

impl GraphData {
    fn require(&self, id: &str) -> Result<&Action> {
        self.actions.get(id).ok_or_else(|| GraphError::unknown(id))
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.run_active {
            return Err(GraphError::GraphLocked);
        }
        Ok(())
    }
}

#[derive(Default)]
struct Shared {
    data: RwLock<GraphData>,
    progress: RwLock<ExecutionSnapshot>,
}

/// A mutable collection of actions and their dependency edges.
///
/// `ActionGraph` is a cheap handle: clones share the same underlying graph.
/// While a run is active the graph is locked; mutations fail with
/// [`GraphError::GraphLocked`] and a second run fails with
/// [`GraphError::RunInProgress`].
///
/// Acyclicity is checked lazily by [`ActionGraph::validate`] (and before
/// every run), so actions and edges can be added in any order.
#[derive(Clone, Default)]
pub struct ActionGraph {
    shared: Arc<Shared>,
}

impl fmt::Debug for ActionGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.read();
        f.debug_struct("ActionGraph")
            .field("actions", &data.order)
            .field("run_active", &data.run_active)
            .finish()
    }
}

impl ActionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, GraphData> {
        self.shared.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GraphData> {
        self.shared.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an action.
    ///
    /// Declared dependencies do not have to be registered yet.
    pub fn add_action(&self, action: Action) -> Result<()> {
        let mut data = self.write();
        data.ensure_unlocked()?;

        let id = action.id().clone();
        if data.actions.contains_key(&id) {
            return Err(GraphError::DuplicateAction(id));
        }
        if action.dependencies().contains(&id) {
            return Err(GraphError::SelfDependency(id));
        }

        for dep in action.dependencies() {
            data.dependents
                .entry(dep.clone())
                .or_default()
                .insert(id.clone());
        }

        debug!(
            action = %id,
            deps = ?action.dependencies(),
            priority = action.priority(),
            "registered action"
        );

        data.order.push(id.clone());
        data.actions.insert(id, action);
        Ok(())
    }

    /// Add an edge: `from` depends on `to`.
    ///
    /// Both actions must already be registered. Adding an existing edge is a
    /// no-op.
    pub fn add_dependency(&self, from: impl Into<ActionId>, to: impl Into<ActionId>) -> Result<()> {
        let from = from.into();
        let to = to.into();

        let mut data = self.write();
        data.ensure_unlocked()?;
        data.require(from.as_str())?;
        data.require(to.as_str())?;

        if from == to {
            return Err(GraphError::SelfDependency(from));
        }

        let added = match data.actions.get_mut(&from) {
            Some(action) => action.add_dependency(to.clone()),
            None => false,
        };

        if added {
            data.dependents
                .entry(to.clone())
                .or_default()
                .insert(from.clone());
            debug!(action = %from, dependency = %to, "added dependency");
        }
        Ok(())
    }

    /// Check that every dependency is registered and the graph is acyclic.
    ///
    /// On a cycle, the error carries the full cycle path.
    pub fn validate(&self) -> Result<()> {
        let data = self.read();
        validate::validate_actions(&data.order, &data.actions)
    }

    /// Registered action ids in registration order.
    pub fn action_ids(&self) -> Vec<ActionId> {
        self.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().actions.contains_key(id)
    }

    /// Direct dependencies of `id`, sorted.
    pub fn dependencies_of(&self, id: &str) -> Result<Vec<ActionId>> {
        let data = self.read();
        let action = data.require(id)?;
        Ok(action.dependencies().iter().cloned().collect())
    }

    /// Registered direct dependents of `id`, sorted.
    pub fn dependents_of(&self, id: &str) -> Result<Vec<ActionId>> {
        let data = self.read();
        data.require(id)?;
        Ok(data
            .dependents
            .get(id)
            .map(|set| {
                set.iter()
                    .filter(|d| data.actions.contains_key(*d))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Transitive dependencies of `id`.
    pub fn ancestors(&self, id: &str) -> Result<BTreeSet<ActionId>> {
        let data = self.read();
        data.require(id)?;
        Ok(closure::ancestors(&data.order, &data.actions, id))
    }

    /// Transitive dependents of `id`.
    pub fn descendants(&self, id: &str) -> Result<BTreeSet<ActionId>> {
        let data = self.read();
        data.require(id)?;
        Ok(closure::descendants(&data.order, &data.actions, id))
    }

    /// One order in which every action comes after all of its dependencies.
    pub fn topological_order(&self) -> Result<Vec<ActionId>> {
        let data = self.read();
        validate::validate_actions(&data.order, &data.actions)?;
        closure::topological_order(&data.order, &data.actions)
            .ok_or(GraphError::CyclicGraph { path: Vec::new() })
    }

    /// Per-action states of the active run, or of the last finished run.
    ///
    /// Before the first run this is empty.
    pub fn snapshot(&self) -> ExecutionSnapshot {
        self.shared
            .progress
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_running(&self) -> bool {
        self.read().run_active
    }

    /// Run the graph with the given options.
    ///
    /// Shorthand for `Scheduler::new(options).run(self)`.
    pub async fn run(&self, options: RunOptions) -> Result<RunOutcome> {
        Scheduler::new(options).run(self).await
    }

    /// Lock the graph for a run, validate it, and capture an execution plan.
    ///
    /// The returned [`RunLock`] unlocks the graph when dropped.
    pub(crate) fn begin_run(&self) -> Result<(RunLock, RunPlan)> {
        let mut data = self.write();
        if data.run_active {
            return Err(GraphError::RunInProgress);
        }
        validate::validate_actions(&data.order, &data.actions)?;

        data.run_active = true;
        data.run_counter += 1;
        let run_id = data.run_counter;

        let mut actions = Vec::with_capacity(data.order.len());
        let mut bodies = HashMap::with_capacity(data.order.len());
        for id in &data.order {
            if let Some(action) = data.actions.get(id) {
                actions.push(PlannedAction {
                    id: id.clone(),
                    dependencies: action.dependencies().iter().cloned().collect(),
                    priority: action.priority(),
                });
                bodies.insert(id.clone(), Arc::clone(action.body()));
            }
        }
        drop(data);

        let lock = RunLock {
            graph: self.clone(),
            run_id,
        };
        lock.reset_progress(&actions);

        Ok((lock, RunPlan { actions, bodies }))
    }
}

/// Everything a run needs, captured when the run starts.
pub(crate) struct RunPlan {
    pub(crate) actions: Vec<PlannedAction>,
    pub(crate) bodies: HashMap<ActionId, Arc<dyn ActionBody>>,
}

/// Holds the run lock of a graph; unlocking happens on drop, so a dropped
/// run future never leaves the graph locked.
pub(crate) struct RunLock {
    graph: ActionGraph,
    run_id: u64,
}

impl RunLock {
    pub(crate) fn run_id(&self) -> u64 {
        self.run_id
    }

    fn reset_progress(&self, actions: &[PlannedAction]) {
        let mut progress = self
            .graph
            .shared
            .progress
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *progress = ExecutionSnapshot::new(self.run_id);
        for action in actions {
            progress.set(action.id.clone(), ActionState::Pending);
        }
    }

    /// Publish state transitions to the graph's live snapshot.
    pub(crate) fn publish(&self, transitions: Vec<(ActionId, ActionState)>) {
        if transitions.is_empty() {
            return;
        }
        let mut progress = self
            .graph
            .shared
            .progress
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for (id, state) in transitions {
            progress.set(id, state);
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let mut data = self.graph.write();
        data.run_active = false;
        debug!(run_id = self.run_id, "graph unlocked");
    }
}
