// src/engine/run_step.rs

//! Step-by-step result type for the run context.

use crate::action::ActionId;

/// Structured result of feeding one event into a [`super::RunContext`].
///
/// Useful for tests that step a run by hand and assert on what changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStep {
    /// Actions whose last dependency just completed; they are now Ready.
    pub newly_ready: Vec<ActionId>,
    /// Actions newly marked Skipped (dependents of a failure, or everything
    /// left when the run halted).
    pub newly_skipped: Vec<ActionId>,
    /// Whether this step left every action in a terminal state.
    pub run_finished: bool,
}
