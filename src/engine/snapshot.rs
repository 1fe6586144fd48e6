// src/engine/snapshot.rs

use std::collections::BTreeMap;

use crate::action::{ActionId, ActionState};

/// Point-in-time view of every action's state in one run.
///
/// Published by the scheduler after each transition and readable through
/// [`crate::dag::ActionGraph::snapshot`] while the run is in progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSnapshot {
    run_id: Option<u64>,
    states: BTreeMap<ActionId, ActionState>,
}

impl ExecutionSnapshot {
    pub fn new(run_id: u64) -> Self {
        Self {
            run_id: Some(run_id),
            states: BTreeMap::new(),
        }
    }

    /// Run this snapshot belongs to; `None` before the first run.
    pub fn run_id(&self) -> Option<u64> {
        self.run_id
    }

    pub fn state_of(&self, id: &str) -> Option<ActionState> {
        self.states.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ActionId, ActionState)> {
        self.states.iter().map(|(id, state)| (id, *state))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of actions currently in `state`.
    pub fn count(&self, state: ActionState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }

    /// Ids of actions currently in `state`, sorted.
    pub fn ids_in(&self, state: ActionState) -> Vec<ActionId> {
        self.states
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Actions that are Ready or Running.
    pub fn frontier(&self) -> Vec<ActionId> {
        self.states
            .iter()
            .filter(|(_, s)| matches!(s, ActionState::Ready | ActionState::Running))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// True when every action has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.states.values().all(|s| s.is_terminal())
    }

    pub(crate) fn set(&mut self, id: ActionId, state: ActionState) {
        self.states.insert(id, state);
    }
}
