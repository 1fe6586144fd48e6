// src/engine/context.rs

//! Pure per-run state machine.
//!
//! [`RunContext`] owns the state of every action for one run and decides:
//! - which actions are ready (all dependencies satisfied)
//! - which actions become Skipped after a failure, a decline, or a halt
//! - when the run is finished, and with which overall status
//!
//! It has no channels, no Tokio types and performs no IO; the async shell in
//! [`super::scheduler`] feeds it completions and asks it for work. Tests can
//! step it by hand.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::action::{
    ActionFailure, ActionId, ActionInputs, ActionOutcome, ActionState, ActionValue,
    DEFAULT_PRIORITY, SkipReason,
};
use crate::engine::outcome::{RunOutcome, RunStatus};
use crate::engine::run_step::RunStep;
use crate::engine::snapshot::ExecutionSnapshot;
use crate::dag::validate::validate_plan;
use crate::engine::RunOptions;
use crate::errors::Result;
use crate::types::FailurePolicy;

/// Static description of one action for a run: id, dependencies, priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    pub id: ActionId,
    pub dependencies: Vec<ActionId>,
    pub priority: i32,
}

impl PlannedAction {
    pub fn new<I, S>(id: impl Into<ActionId>, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ActionId>,
    {
        let mut dependencies: Vec<ActionId> = dependencies.into_iter().map(Into::into).collect();
        dependencies.sort();
        dependencies.dedup();
        Self {
            id: id.into(),
            dependencies,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// How a dispatched action finished.
#[derive(Debug)]
pub enum Completion {
    Succeeded(ActionValue),
    Failed(ActionFailure),
    /// The body declined to run (see [`crate::action::SkipAction`]).
    Declined(String),
}

/// An action handed out for execution, with its dependency results.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub id: ActionId,
    pub inputs: ActionInputs,
}

#[derive(Debug)]
struct Entry {
    dependencies: Vec<ActionId>,
    dependents: Vec<ActionId>,
    priority: i32,
    /// Registration index; tie-breaker among equal priorities.
    seq: usize,
    /// Dependencies that have not completed yet.
    remaining: usize,
    state: ActionState,
    outcome: Option<ActionOutcome>,
}

/// Ready-queue key: lowest priority value first, then registration order.
type ReadyKey = Reverse<(i32, usize, ActionId)>;

/// Per-run state of every action in a graph.
#[derive(Debug)]
pub struct RunContext {
    run_id: u64,
    order: Vec<ActionId>,
    entries: HashMap<ActionId, Entry>,
    ready: BinaryHeap<ReadyKey>,
    policy: FailurePolicy,
    lenient: bool,
    /// Set once no further actions may be dispatched.
    halted: Option<SkipReason>,
    succeeded: usize,
    /// Successes recorded when a cancel or timeout halted the run.
    succeeded_at_cancel: Option<usize>,
    running: usize,
    /// Actions not yet in a terminal state.
    unfinished: usize,
    /// Transitions since the last `take_transitions` call.
    transitions: Vec<(ActionId, ActionState)>,
}

impl RunContext {
    /// Build the state for a new run. Actions without dependencies start
    /// Ready; everything else starts Pending.
    ///
    /// The plan is validated first: duplicate ids, self edges, dependencies
    /// missing from the plan and cycles are rejected.
    pub fn new(run_id: u64, plan: Vec<PlannedAction>, options: &RunOptions) -> Result<Self> {
        validate_plan(&plan)?;

        let mut order = Vec::with_capacity(plan.len());
        let mut entries = HashMap::with_capacity(plan.len());

        for (seq, planned) in plan.into_iter().enumerate() {
            order.push(planned.id.clone());
            entries.insert(
                planned.id,
                Entry {
                    remaining: planned.dependencies.len(),
                    dependencies: planned.dependencies,
                    dependents: Vec::new(),
                    priority: planned.priority,
                    seq,
                    state: ActionState::Pending,
                    outcome: None,
                },
            );
        }

        for id in &order {
            let deps = entries
                .get(id)
                .map(|e| e.dependencies.clone())
                .unwrap_or_default();
            for dep in &deps {
                if let Some(dep_entry) = entries.get_mut(dep) {
                    dep_entry.dependents.push(id.clone());
                }
            }
        }

        let unfinished = order.len();
        let mut ctx = Self {
            run_id,
            order,
            entries,
            ready: BinaryHeap::new(),
            policy: options.on_failure,
            lenient: options.lenient,
            halted: None,
            succeeded: 0,
            succeeded_at_cancel: None,
            running: 0,
            unfinished,
            transitions: Vec::new(),
        };

        let roots: Vec<ActionId> = ctx
            .order
            .iter()
            .filter(|id| ctx.entries.get(*id).is_some_and(|e| e.remaining == 0))
            .cloned()
            .collect();
        for id in roots {
            ctx.make_ready(&id);
        }

        debug!(
            run_id,
            actions = ctx.order.len(),
            ready = ctx.ready.len(),
            policy = %ctx.policy,
            lenient = ctx.lenient,
            "run context created"
        );

        Ok(ctx)
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn state_of(&self, id: &str) -> Option<ActionState> {
        self.entries.get(id).map(|e| e.state)
    }

    /// Number of actions currently Running.
    pub fn running(&self) -> usize {
        self.running
    }

    /// Whether any action is waiting for a worker slot.
    pub fn has_ready(&self) -> bool {
        self.halted.is_none() && !self.ready.is_empty()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    pub fn halt_reason(&self) -> Option<&SkipReason> {
        self.halted.as_ref()
    }

    /// True once no action is Pending, Ready or Running.
    pub fn is_finished(&self) -> bool {
        self.unfinished == 0
    }

    pub fn snapshot(&self) -> ExecutionSnapshot {
        let mut snapshot = ExecutionSnapshot::new(self.run_id);
        for id in &self.order {
            if let Some(entry) = self.entries.get(id) {
                snapshot.set(id.clone(), entry.state);
            }
        }
        snapshot
    }

    /// Drain the state transitions recorded since the last call.
    pub fn take_transitions(&mut self) -> Vec<(ActionId, ActionState)> {
        std::mem::take(&mut self.transitions)
    }

    /// Take the next Ready action (lowest priority value first) and mark it
    /// Running. Returns `None` when nothing is ready or the run is halted.
    pub fn next_ready(&mut self) -> Option<Dispatch> {
        if self.halted.is_some() {
            return None;
        }

        while let Some(Reverse((_, _, id))) = self.ready.pop() {
            if self.state_of(id.as_str()) != Some(ActionState::Ready) {
                continue;
            }
            if !self.transition(&id, ActionState::Running) {
                continue;
            }
            self.running += 1;

            let inputs = self.inputs_for(&id);
            info!(
                run_id = self.run_id,
                action = %id,
                inputs = inputs.len(),
                "dispatching action"
            );
            return Some(Dispatch { id, inputs });
        }

        None
    }

    /// Record the completion of a Running action and advance the run.
    ///
    /// Completions for unknown actions, or for actions that are not Running,
    /// are ignored.
    pub fn complete(&mut self, id: &str, completion: Completion) -> RunStep {
        let mut step = RunStep::default();

        let id = match self.entries.get_key_value(id) {
            Some((key, entry)) if entry.state == ActionState::Running => key.clone(),
            Some((key, entry)) => {
                warn!(
                    run_id = self.run_id,
                    action = %key,
                    state = ?entry.state,
                    "completion for action that is not running; ignoring"
                );
                step.run_finished = self.is_finished();
                return step;
            }
            None => {
                warn!(run_id = self.run_id, action = %id, "completion for unknown action; ignoring");
                step.run_finished = self.is_finished();
                return step;
            }
        };

        self.running = self.running.saturating_sub(1);

        match completion {
            Completion::Succeeded(value) => {
                debug!(run_id = self.run_id, action = %id, "action succeeded");
                if self.finish(&id, ActionState::Succeeded, ActionOutcome::Succeeded(value)) {
                    self.succeeded += 1;
                }
                step.newly_ready = self.release_dependents(&id);
            }
            Completion::Failed(failure) => {
                warn!(
                    run_id = self.run_id,
                    action = %id,
                    error = %failure,
                    policy = %self.policy,
                    "action failed; skipping dependents"
                );
                self.finish(&id, ActionState::Failed, ActionOutcome::Failed(failure));
                step.newly_skipped = self.skip_dependents(&id, SkipReason::UpstreamFailed(id.clone()));
                if self.policy == FailurePolicy::FailFast {
                    let halted = self.halt_remaining(SkipReason::Halted(id.clone()));
                    step.newly_skipped.extend(halted);
                }
            }
            Completion::Declined(reason) => {
                info!(
                    run_id = self.run_id,
                    action = %id,
                    reason = %reason,
                    "action declined to run"
                );
                self.finish(
                    &id,
                    ActionState::Skipped,
                    ActionOutcome::Skipped(SkipReason::Declined(reason)),
                );
                if self.lenient {
                    step.newly_ready = self.release_dependents(&id);
                } else {
                    step.newly_skipped =
                        self.skip_dependents(&id, SkipReason::UpstreamSkipped(id.clone()));
                }
            }
        }

        step.run_finished = self.is_finished();
        step
    }

    /// Stop dispatching and mark every Pending or Ready action Skipped with
    /// `reason`. Running actions are left to finish. A second halt is a no-op.
    pub fn halt(&mut self, reason: SkipReason) -> RunStep {
        let newly_skipped = self.halt_remaining(reason);
        RunStep {
            newly_ready: Vec::new(),
            newly_skipped,
            run_finished: self.is_finished(),
        }
    }

    /// Overall status as it stands now.
    ///
    /// A run halted by a cancel or timeout is Aborted when nothing had
    /// succeeded at the moment of the halt, even if in-flight actions
    /// succeed afterwards.
    pub fn status(&self) -> RunStatus {
        if self.succeeded == self.order.len() {
            RunStatus::AllSucceeded
        } else if self.succeeded_at_cancel == Some(0) {
            RunStatus::Aborted
        } else {
            RunStatus::PartialFailure
        }
    }

    /// Consume the context into the final outcome.
    pub fn into_outcome(self, elapsed: Duration) -> RunOutcome {
        let status = self.status();
        let Self {
            run_id,
            order,
            mut entries,
            ..
        } = self;

        let mut actions = BTreeMap::new();
        for id in &order {
            let outcome = match entries.remove(id).and_then(|e| e.outcome) {
                Some(outcome) => outcome,
                None => {
                    warn!(run_id, action = %id, "action had no terminal outcome; recording as cancelled");
                    ActionOutcome::Skipped(SkipReason::Cancelled)
                }
            };
            actions.insert(id.clone(), outcome);
        }

        RunOutcome::new(run_id, status, order, actions, elapsed)
    }

    fn inputs_for(&self, id: &ActionId) -> ActionInputs {
        let Some(entry) = self.entries.get(id) else {
            return ActionInputs::new();
        };

        entry
            .dependencies
            .iter()
            .filter_map(|dep| {
                self.entries
                    .get(dep)
                    .and_then(|e| e.outcome.as_ref())
                    .and_then(ActionOutcome::value)
                    .map(|value| (dep.clone(), value.clone()))
            })
            .collect()
    }

    fn transition(&mut self, id: &ActionId, next: ActionState) -> bool {
        let Some(entry) = self.entries.get_mut(id) else {
            warn!(run_id = self.run_id, action = %id, "transition for unknown action; ignoring");
            return false;
        };

        if !entry.state.can_transition_to(next) {
            warn!(
                run_id = self.run_id,
                action = %id,
                from = ?entry.state,
                to = ?next,
                "ignoring illegal state transition"
            );
            return false;
        }

        debug!(
            run_id = self.run_id,
            action = %id,
            from = ?entry.state,
            to = ?next,
            "state transition"
        );
        entry.state = next;
        self.transitions.push((id.clone(), next));
        true
    }

    fn make_ready(&mut self, id: &ActionId) -> bool {
        if !self.transition(id, ActionState::Ready) {
            return false;
        }
        if let Some(entry) = self.entries.get(id) {
            self.ready.push(Reverse((entry.priority, entry.seq, id.clone())));
        }
        true
    }

    /// Move an action into a terminal state and store its outcome.
    fn finish(&mut self, id: &ActionId, state: ActionState, outcome: ActionOutcome) -> bool {
        if !self.transition(id, state) {
            return false;
        }
        if let Some(entry) = self.entries.get_mut(id) {
            entry.outcome = Some(outcome);
        }
        self.unfinished = self.unfinished.saturating_sub(1);
        true
    }

    fn dependents_of(&self, id: &ActionId) -> Vec<ActionId> {
        self.entries
            .get(id)
            .map(|e| e.dependents.clone())
            .unwrap_or_default()
    }

    /// Count down the dependents of a satisfied action; those reaching zero
    /// become Ready.
    fn release_dependents(&mut self, id: &ActionId) -> Vec<ActionId> {
        let mut newly_ready = Vec::new();

        for dependent in self.dependents_of(id) {
            let now_ready = match self.entries.get_mut(&dependent) {
                Some(entry) if entry.state == ActionState::Pending => {
                    entry.remaining = entry.remaining.saturating_sub(1);
                    entry.remaining == 0
                }
                _ => false,
            };

            if now_ready && self.make_ready(&dependent) {
                newly_ready.push(dependent);
            }
        }

        newly_ready
    }

    /// Mark every not-yet-started transitive dependent of `root` Skipped.
    fn skip_dependents(&mut self, root: &ActionId, reason: SkipReason) -> Vec<ActionId> {
        let mut stack = self.dependents_of(root);
        let mut skipped = Vec::new();

        while let Some(id) = stack.pop() {
            if !matches!(
                self.state_of(id.as_str()),
                Some(ActionState::Pending) | Some(ActionState::Ready)
            ) {
                continue;
            }

            if self.finish(&id, ActionState::Skipped, ActionOutcome::Skipped(reason.clone())) {
                debug!(
                    run_id = self.run_id,
                    action = %id,
                    reason = %reason,
                    "marked dependent Skipped"
                );
                stack.extend(self.dependents_of(&id));
                skipped.push(id);
            }
        }

        skipped
    }

    fn halt_remaining(&mut self, reason: SkipReason) -> Vec<ActionId> {
        if self.halted.is_some() {
            return Vec::new();
        }

        info!(
            run_id = self.run_id,
            reason = %reason,
            running = self.running,
            "halting run; no further actions will be dispatched"
        );
        if reason.is_cancellation() {
            self.succeeded_at_cancel = Some(self.succeeded);
        }
        self.halted = Some(reason.clone());
        self.ready.clear();

        let remaining: Vec<ActionId> = self
            .order
            .iter()
            .filter(|id| {
                matches!(
                    self.state_of(id.as_str()),
                    Some(ActionState::Pending) | Some(ActionState::Ready)
                )
            })
            .cloned()
            .collect();

        let mut skipped = Vec::with_capacity(remaining.len());
        for id in remaining {
            if self.finish(&id, ActionState::Skipped, ActionOutcome::Skipped(reason.clone())) {
                skipped.push(id);
            }
        }
        skipped
    }
}
