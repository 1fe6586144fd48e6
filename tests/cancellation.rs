mod common;
use crate::common::builders::GraphBuilder;
use crate::common::probes::{Gate, Probe};
use crate::common::{init_tracing, wait_for_state, with_timeout};

use std::error::Error;
use std::time::Duration;

use action_graph::{
    Action, ActionState, CancelHandle, RunOptions, RunStatus, Scheduler, SkipReason, action_fn,
};
use anyhow::anyhow;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn cancel_stops_dispatch_and_lets_running_actions_finish() -> TestResult {
    init_tracing();
    let probe = Probe::new();
    let gate = Gate::new();
    let graph = GraphBuilder::new()
        .action(probe.gated_action("slow", &[], &gate))
        .action(probe.action("after", &["slow"]))
        .action(probe.action("later", &["after"]))
        .build();

    let scheduler = Scheduler::new(RunOptions::default());
    let cancel = scheduler.cancel_handle();
    let run = tokio::spawn({
        let graph = graph.clone();
        async move { scheduler.run(&graph).await }
    });

    with_timeout(probe.wait_until_started("slow")).await;
    cancel.cancel();
    assert!(cancel.is_cancelled());
    gate.open();

    let outcome = with_timeout(run).await??;

    assert_eq!(outcome.state_of("slow"), Some(ActionState::Succeeded));
    assert_eq!(outcome.skip_reason("after"), Some(&SkipReason::Cancelled));
    assert_eq!(outcome.skip_reason("later"), Some(&SkipReason::Cancelled));
    // Nothing had succeeded when the cancel arrived; the late success of
    // the in-flight action does not change that.
    assert_eq!(outcome.status(), RunStatus::Aborted);
    assert_eq!(outcome.exit_code(), 2);
    assert!(!probe.has_started("after"));
    Ok(())
}

#[tokio::test]
async fn cancel_after_a_success_is_partial_failure() -> TestResult {
    init_tracing();
    let probe = Probe::new();
    let gate = Gate::new();
    let graph = GraphBuilder::new()
        .action(probe.action("quick", &[]))
        .action(probe.gated_action("slow", &[], &gate))
        .action(probe.action("after", &["slow"]))
        .build();

    let scheduler = Scheduler::new(RunOptions::default());
    let cancel = scheduler.cancel_handle();
    let run = tokio::spawn({
        let graph = graph.clone();
        async move { scheduler.run(&graph).await }
    });

    with_timeout(wait_for_state(&graph, "quick", ActionState::Succeeded)).await;
    with_timeout(probe.wait_until_started("slow")).await;
    cancel.cancel();
    with_timeout(wait_for_state(&graph, "after", ActionState::Skipped)).await;
    gate.open();

    let outcome = with_timeout(run).await??;

    assert_eq!(outcome.state_of("slow"), Some(ActionState::Succeeded));
    assert_eq!(outcome.skip_reason("after"), Some(&SkipReason::Cancelled));
    assert_eq!(outcome.status(), RunStatus::PartialFailure);
    Ok(())
}

#[tokio::test]
async fn cancelled_before_start_aborts_every_action() -> TestResult {
    let probe = Probe::new();
    let graph = GraphBuilder::new()
        .action(probe.action("a", &[]))
        .action(probe.action("b", &["a"]))
        .build();

    let scheduler = Scheduler::new(RunOptions::default());
    scheduler.cancel_handle().cancel();

    let outcome = with_timeout(scheduler.run(&graph)).await?;

    assert_eq!(outcome.status(), RunStatus::Aborted);
    assert_eq!(outcome.exit_code(), 2);
    assert_eq!(outcome.counts().skipped, 2);
    assert_eq!(outcome.skip_reason("a"), Some(&SkipReason::Cancelled));
    assert!(probe.started().is_empty());

    // Cancellation sticks to the scheduler.
    let again = with_timeout(scheduler.run(&graph)).await?;
    assert_eq!(again.status(), RunStatus::Aborted);

    // A fresh scheduler runs the same graph normally.
    let fresh = with_timeout(Scheduler::new(RunOptions::default()).run(&graph)).await?;
    assert_eq!(fresh.status(), RunStatus::AllSucceeded);
    Ok(())
}

#[tokio::test]
async fn cancel_handle_resolves_waiters() {
    let handle = CancelHandle::new();
    let waiter = tokio::spawn({
        let handle = handle.clone();
        async move { handle.cancelled().await }
    });

    assert!(!handle.is_cancelled());
    handle.cancel();
    with_timeout(waiter).await.unwrap();
    assert!(handle.is_cancelled());
}

#[tokio::test]
async fn timeout_skips_remaining_actions() -> TestResult {
    init_tracing();
    let probe = Probe::new();
    let graph = GraphBuilder::new()
        .action(probe.action_with_delay("quick", &[], Duration::from_millis(5)))
        .action(probe.action_with_delay("slow", &[], Duration::from_millis(400)))
        .action(probe.action("after", &["slow"]))
        .build();

    let timeout = Duration::from_millis(100);
    let outcome = with_timeout(graph.run(RunOptions::default().with_timeout(timeout))).await?;

    // In-flight work is not interrupted.
    assert_eq!(outcome.state_of("quick"), Some(ActionState::Succeeded));
    assert_eq!(outcome.state_of("slow"), Some(ActionState::Succeeded));
    assert_eq!(outcome.skip_reason("after"), Some(&SkipReason::TimedOut(timeout)));
    assert_eq!(outcome.status(), RunStatus::PartialFailure);
    assert!(!probe.has_started("after"));
    Ok(())
}

#[tokio::test]
async fn timeout_without_any_success_is_aborted() -> TestResult {
    let graph = GraphBuilder::new()
        .action(Action::new(
            "doomed",
            action_fn(|_| async {
                tokio::time::sleep(Duration::from_millis(150)).await;
                Err(anyhow!("too late anyway"))
            }),
        ))
        .action(
            Action::new("never", action_fn(|_| async { Ok(serde_json::json!(null)) }))
                .depends_on("doomed"),
        )
        .build();

    let options = RunOptions::default()
        .with_timeout(Duration::from_millis(20))
        .with_failure_policy(action_graph::FailurePolicy::Continue);
    let outcome = with_timeout(graph.run(options)).await?;

    assert_eq!(outcome.state_of("doomed"), Some(ActionState::Failed));
    assert!(matches!(outcome.skip_reason("never"), Some(SkipReason::TimedOut(_))));
    assert_eq!(outcome.status(), RunStatus::Aborted);
    Ok(())
}

#[tokio::test]
async fn run_finishing_before_timeout_is_unaffected() -> TestResult {
    let probe = Probe::new();
    let graph = GraphBuilder::new()
        .action(probe.action("a", &[]))
        .action(probe.action("b", &["a"]))
        .build();

    let options = RunOptions::default().with_timeout(Duration::from_secs(2));
    let outcome = with_timeout(graph.run(options)).await?;

    assert_eq!(outcome.status(), RunStatus::AllSucceeded);
    assert!(outcome.elapsed() < Duration::from_secs(2));
    Ok(())
}
