// src/engine/scheduler.rs

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info};

use crate::action::{ActionBody, ActionFailure, ActionId, SkipReason};
use crate::dag::ActionGraph;
use crate::errors::Result;

use super::context::{Completion, RunContext};
use super::worker::spawn_action;
use super::{CancelHandle, RunEvent, RunOptions, RunOutcome};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Executes action graphs.
///
/// This is the async shell around [`RunContext`]: it owns the event channel,
/// spawns workers for dispatched actions and feeds their completions back
/// into the context. All scheduling decisions are made by the context.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    options: RunOptions,
    cancel: CancelHandle,
}

impl Scheduler {
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            cancel: CancelHandle::new(),
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Handle that cancels the current and all later runs of this scheduler.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run every action of `graph` in dependency order.
    ///
    /// Structural problems and lifecycle conflicts are returned as `Err`
    /// before any action runs. Failures of individual actions are reported
    /// in the returned [`RunOutcome`].
    pub async fn run(&self, graph: &ActionGraph) -> Result<RunOutcome> {
        let started = Instant::now();
        let (lock, plan) = graph.begin_run()?;
        let run_id = lock.run_id();

        info!(
            run_id,
            actions = plan.actions.len(),
            max_parallelism = %self.options.max_parallelism,
            policy = %self.options.on_failure,
            lenient = self.options.lenient,
            timeout = ?self.options.timeout,
            "starting run"
        );

        let mut ctx = RunContext::new(run_id, plan.actions, &self.options)?;
        let (tx, mut rx) = mpsc::channel::<RunEvent>(EVENT_CHANNEL_CAPACITY);
        let deadline = self.options.timeout.map(|timeout| (started + timeout, timeout));

        if self.cancel.is_cancelled() {
            info!(run_id, "scheduler already cancelled; skipping all actions");
            ctx.halt(SkipReason::Cancelled);
        }

        loop {
            self.dispatch_ready(&mut ctx, &plan.bodies, &tx);
            lock.publish(ctx.take_transitions());

            if ctx.is_finished() {
                break;
            }

            if ctx.running() == 0 {
                // Nothing in flight and nothing dispatchable: no completion
                // can ever arrive.
                error!(run_id, "run stalled with no running actions; halting");
                ctx.halt(SkipReason::Cancelled);
                lock.publish(ctx.take_transitions());
                break;
            }

            tokio::select! {
                event = rx.recv() => match event {
                    Some(RunEvent::Completed { id, completion }) => {
                        let step = ctx.complete(id.as_str(), completion);
                        debug!(
                            run_id,
                            action = %id,
                            newly_ready = step.newly_ready.len(),
                            newly_skipped = step.newly_skipped.len(),
                            running = ctx.running(),
                            "processed completion"
                        );
                    }
                    None => {
                        error!(run_id, "run event channel closed unexpectedly");
                        break;
                    }
                },

                _ = self.cancel.cancelled(), if !ctx.is_halted() => {
                    info!(run_id, running = ctx.running(), "cancellation requested");
                    ctx.halt(SkipReason::Cancelled);
                }

                _ = wait_for_deadline(deadline), if deadline.is_some() && !ctx.is_halted() => {
                    let timeout = deadline.map(|(_, timeout)| timeout).unwrap_or_default();
                    info!(run_id, ?timeout, running = ctx.running(), "run timed out");
                    ctx.halt(SkipReason::TimedOut(timeout));
                }
            }
        }

        let outcome = ctx.into_outcome(started.elapsed());
        let counts = outcome.counts();
        info!(
            run_id,
            status = %outcome.status(),
            succeeded = counts.succeeded,
            failed = counts.failed,
            skipped = counts.skipped,
            elapsed_ms = outcome.elapsed().as_millis() as u64,
            "run finished"
        );

        Ok(outcome)
    }

    /// Start Ready actions until the parallelism bound is reached.
    fn dispatch_ready(
        &self,
        ctx: &mut RunContext,
        bodies: &HashMap<ActionId, Arc<dyn ActionBody>>,
        tx: &mpsc::Sender<RunEvent>,
    ) {
        while self.options.max_parallelism.allows(ctx.running()) {
            let Some(dispatch) = ctx.next_ready() else {
                break;
            };

            match bodies.get(&dispatch.id) {
                Some(body) => spawn_action(
                    ctx.run_id(),
                    dispatch.id,
                    Arc::clone(body),
                    dispatch.inputs,
                    tx.clone(),
                ),
                None => {
                    error!(run_id = ctx.run_id(), action = %dispatch.id, "no body captured for action");
                    let failure = ActionFailure::Error(anyhow::anyhow!(
                        "no body captured for action '{}'",
                        dispatch.id
                    ));
                    ctx.complete(dispatch.id.as_str(), Completion::Failed(failure));
                }
            }
        }
    }
}

async fn wait_for_deadline(deadline: Option<(Instant, std::time::Duration)>) {
    match deadline {
        Some((at, _)) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
