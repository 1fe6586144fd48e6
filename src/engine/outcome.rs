// src/engine/outcome.rs

//! Final result of one run.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::action::{ActionFailure, ActionId, ActionOutcome, ActionState, ActionValue, SkipReason};

/// Overall status of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    /// Every action succeeded (vacuously true for an empty graph).
    AllSucceeded,
    /// At least one action failed or was skipped.
    PartialFailure,
    /// The run was cancelled or timed out before any action succeeded.
    Aborted,
}

impl RunStatus {
    /// Process exit code conventionally used for this status.
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::AllSucceeded => 0,
            RunStatus::PartialFailure => 1,
            RunStatus::Aborted => 2,
        }
    }

    pub fn is_success(self) -> bool {
        self == RunStatus::AllSucceeded
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::AllSucceeded => "all succeeded",
            RunStatus::PartialFailure => "partial failure",
            RunStatus::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Number of actions per terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl OutcomeCounts {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

/// Per-action outcomes plus overall status of one run.
///
/// Contains an entry for every action registered when the run started.
#[derive(Debug)]
pub struct RunOutcome {
    run_id: u64,
    status: RunStatus,
    order: Vec<ActionId>,
    actions: BTreeMap<ActionId, ActionOutcome>,
    elapsed: Duration,
}

impl RunOutcome {
    pub(crate) fn new(
        run_id: u64,
        status: RunStatus,
        order: Vec<ActionId>,
        actions: BTreeMap<ActionId, ActionOutcome>,
        elapsed: Duration,
    ) -> Self {
        Self {
            run_id,
            status,
            order,
            actions,
            elapsed,
        }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ActionOutcome> {
        self.actions.get(id)
    }

    pub fn state_of(&self, id: &str) -> Option<ActionState> {
        self.actions.get(id).map(ActionOutcome::state)
    }

    /// Result value of a succeeded action.
    pub fn value(&self, id: &str) -> Option<&ActionValue> {
        self.actions.get(id).and_then(ActionOutcome::value)
    }

    pub fn failure(&self, id: &str) -> Option<&ActionFailure> {
        self.actions.get(id).and_then(ActionOutcome::failure)
    }

    pub fn skip_reason(&self, id: &str) -> Option<&SkipReason> {
        self.actions.get(id).and_then(ActionOutcome::skip_reason)
    }

    /// Outcomes in action registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&ActionId, &ActionOutcome)> {
        self.order
            .iter()
            .filter_map(|id| self.actions.get_key_value(id))
    }

    pub fn succeeded(&self) -> Vec<&ActionId> {
        self.ids_where(ActionOutcome::is_succeeded)
    }

    pub fn failed(&self) -> Vec<&ActionId> {
        self.ids_where(ActionOutcome::is_failed)
    }

    pub fn skipped(&self) -> Vec<&ActionId> {
        self.ids_where(ActionOutcome::is_skipped)
    }

    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for outcome in self.actions.values() {
            match outcome {
                ActionOutcome::Succeeded(_) => counts.succeeded += 1,
                ActionOutcome::Failed(_) => counts.failed += 1,
                ActionOutcome::Skipped(_) => counts.skipped += 1,
            }
        }
        counts
    }

    /// Terminal state kind of every action.
    pub fn states(&self) -> BTreeMap<ActionId, ActionState> {
        self.actions
            .iter()
            .map(|(id, outcome)| (id.clone(), outcome.state()))
            .collect()
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    pub fn into_actions(self) -> BTreeMap<ActionId, ActionOutcome> {
        self.actions
    }

    fn ids_where(&self, pred: impl Fn(&ActionOutcome) -> bool) -> Vec<&ActionId> {
        self.iter()
            .filter(|(_, outcome)| pred(*outcome))
            .map(|(id, _)| id)
            .collect()
    }
}
