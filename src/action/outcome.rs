// src/action/outcome.rs

//! Per-action run state and terminal outcomes.

use std::time::Duration;

use thiserror::Error;

use crate::action::{ActionId, ActionValue};

/// Lifecycle state of one action within one run.
///
/// Transitions only move forward:
/// `Pending -> Ready -> Running -> {Succeeded | Failed | Skipped}`, and
/// `Pending | Ready -> Skipped` when the action will never be dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionState {
    /// Waiting on at least one dependency.
    Pending,
    /// All dependencies satisfied; waiting for a free worker slot.
    Ready,
    /// Body has been dispatched and has not reported back yet.
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl ActionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ActionState::Succeeded | ActionState::Failed | ActionState::Skipped
        )
    }

    /// Whether `self -> next` is a legal (forward) transition.
    pub fn can_transition_to(self, next: ActionState) -> bool {
        use ActionState::*;
        matches!(
            (self, next),
            (Pending, Ready)
                | (Pending, Skipped)
                | (Ready, Running)
                | (Ready, Skipped)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, Skipped)
        )
    }
}

/// Why an action ended up Skipped.
///
/// `Cancelled` and `TimedOut` are the cancellation reasons; the others come
/// from failure propagation or from the body itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("upstream action '{0}' failed")]
    UpstreamFailed(ActionId),

    #[error("upstream action '{0}' was skipped")]
    UpstreamSkipped(ActionId),

    #[error("run halted after '{0}' failed (fail-fast)")]
    Halted(ActionId),

    #[error("run cancelled")]
    Cancelled,

    #[error("run timed out after {0:?}")]
    TimedOut(Duration),

    #[error("action declined to run: {0}")]
    Declined(String),
}

impl SkipReason {
    /// True for skips caused by cancellation or timeout.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SkipReason::Cancelled | SkipReason::TimedOut(_))
    }
}

/// Failure captured at the action boundary.
#[derive(Error, Debug)]
pub enum ActionFailure {
    /// The body returned an error. The original error chain is kept.
    #[error("{0:#}")]
    Error(anyhow::Error),

    #[error("action body panicked: {0}")]
    Panicked(String),
}

impl ActionFailure {
    /// The error returned by the body, if it returned one.
    pub fn source_error(&self) -> Option<&anyhow::Error> {
        match self {
            ActionFailure::Error(err) => Some(err),
            ActionFailure::Panicked(_) => None,
        }
    }
}

/// Terminal result of one action in a finished run.
#[derive(Debug)]
pub enum ActionOutcome {
    Succeeded(ActionValue),
    Failed(ActionFailure),
    Skipped(SkipReason),
}

impl ActionOutcome {
    pub fn state(&self) -> ActionState {
        match self {
            ActionOutcome::Succeeded(_) => ActionState::Succeeded,
            ActionOutcome::Failed(_) => ActionState::Failed,
            ActionOutcome::Skipped(_) => ActionState::Skipped,
        }
    }

    pub fn value(&self) -> Option<&ActionValue> {
        match self {
            ActionOutcome::Succeeded(v) => Some(v),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&ActionFailure> {
        match self {
            ActionOutcome::Failed(f) => Some(f),
            _ => None,
        }
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            ActionOutcome::Skipped(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, ActionOutcome::Succeeded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ActionOutcome::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ActionOutcome::Skipped(_))
    }
}
