// src/engine/mod.rs

//! Execution engine for action graphs.
//!
//! This module ties together:
//! - the pure per-run state machine ([`context`]) that decides which actions
//!   are ready, which are skipped after a failure, and when a run is over
//! - the async shell ([`scheduler`]) that reacts to:
//!   - action completion events from workers
//!   - cancellation requests
//!   - the run deadline
//! - per-run reporting ([`outcome`], [`snapshot`])

use std::time::Duration;

use crate::action::ActionId;
use crate::types::{FailurePolicy, Parallelism};

/// Options for a single run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Maximum number of actions Running at once.
    pub max_parallelism: Parallelism,
    /// What happens to not-yet-started actions after a failure.
    pub on_failure: FailurePolicy,
    /// Wall-clock limit for the whole run.
    pub timeout: Option<Duration>,
    /// Treat dependencies that declined to run as satisfied.
    pub lenient: bool,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_parallelism(mut self, max_parallelism: impl Into<Parallelism>) -> Self {
        self.max_parallelism = max_parallelism.into();
        self
    }

    pub fn with_failure_policy(mut self, on_failure: FailurePolicy) -> Self {
        self.on_failure = on_failure;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }
}

/// Events flowing from workers into the run coordinator.
#[derive(Debug)]
pub enum RunEvent {
    /// An action body finished (successfully, with an error, by declining,
    /// or by panicking).
    Completed { id: ActionId, completion: Completion },
}

mod cancel;
pub mod context;
pub mod outcome;
pub mod run_step;
pub mod scheduler;
pub mod snapshot;
mod worker;

pub use cancel::CancelHandle;
pub use context::{Completion, Dispatch, PlannedAction, RunContext};
pub use outcome::{OutcomeCounts, RunOutcome, RunStatus};
pub use run_step::RunStep;
pub use scheduler::Scheduler;
pub use snapshot::ExecutionSnapshot;
