mod common;
use crate::common::builders::{GraphBuilder, noop_action};
use crate::common::probes::{Gate, Probe};
use crate::common::{init_tracing, wait_for_state, with_timeout};

use std::collections::BTreeMap;
use std::error::Error;
use std::time::Duration;

use action_graph::{ActionId, ActionState, GraphError, RunOptions, RunStatus};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn graph_is_locked_while_a_run_is_active() -> TestResult {
    init_tracing();
    let probe = Probe::new();
    let gate = Gate::new();
    let graph = GraphBuilder::new()
        .action(probe.gated_action("slow", &[], &gate))
        .action(probe.action("next", &["slow"]))
        .build();

    let run = tokio::spawn({
        let graph = graph.clone();
        async move { graph.run(RunOptions::default()).await }
    });
    with_timeout(wait_for_state(&graph, "slow", ActionState::Running)).await;

    assert!(graph.is_running());
    assert_eq!(
        graph.add_action(noop_action("extra", &[])).unwrap_err(),
        GraphError::GraphLocked
    );
    assert_eq!(
        graph.add_dependency("slow", "next").unwrap_err(),
        GraphError::GraphLocked
    );
    assert_eq!(
        graph.run(RunOptions::default()).await.unwrap_err(),
        GraphError::RunInProgress
    );

    let live = graph.snapshot();
    assert_eq!(live.state_of("slow"), Some(ActionState::Running));
    assert_eq!(live.state_of("next"), Some(ActionState::Pending));
    assert_eq!(live.frontier(), vec!["slow"]);
    assert!(!live.is_finished());

    gate.open();
    let outcome = with_timeout(run).await??;
    assert_eq!(outcome.status(), RunStatus::AllSucceeded);

    assert!(!graph.is_running());
    graph.add_action(noop_action("extra", &["next"]))?;
    Ok(())
}

#[tokio::test]
async fn snapshot_after_run_holds_final_states() -> TestResult {
    let probe = Probe::new();
    let graph = GraphBuilder::new()
        .action(probe.failing_action("bad", &[], "x"))
        .action(probe.action("child", &["bad"]))
        .build();

    let outcome = with_timeout(graph.run(RunOptions::default())).await?;

    let snapshot = graph.snapshot();
    assert_eq!(snapshot.run_id(), Some(outcome.run_id()));
    assert!(snapshot.is_finished());
    assert_eq!(snapshot.state_of("bad"), Some(ActionState::Failed));
    assert_eq!(snapshot.state_of("child"), Some(ActionState::Skipped));
    assert_eq!(snapshot.count(ActionState::Skipped), 1);
    let published: BTreeMap<ActionId, ActionState> =
        snapshot.iter().map(|(id, s)| (id.clone(), s)).collect();
    assert_eq!(outcome.states(), published);
    Ok(())
}

#[tokio::test]
async fn repeated_runs_are_independent_and_deterministic() -> TestResult {
    let probe = Probe::new();
    let graph = GraphBuilder::new()
        .action(probe.action("a", &[]))
        .action(probe.failing_action("b", &["a"], "always"))
        .action(probe.action("c", &["b"]))
        .action(probe.action("d", &["a"]))
        .build();
    let options = RunOptions::default().with_failure_policy(action_graph::FailurePolicy::Continue);

    let first = with_timeout(graph.run(options)).await?;
    let second = with_timeout(graph.run(options)).await?;

    assert_eq!(first.states(), second.states());
    assert_eq!(first.status(), second.status());
    assert_eq!(second.run_id(), first.run_id() + 1);

    // Bodies ran again; no result leaked from the first run.
    assert_eq!(probe.started().iter().filter(|s| *s == "a").count(), 2);
    assert!(!probe.has_started("c"));
    Ok(())
}

#[tokio::test]
async fn dropping_a_run_unlocks_the_graph() -> TestResult {
    let probe = Probe::new();
    let gate = Gate::new();
    let graph = GraphBuilder::new()
        .action(probe.gated_action("stuck", &[], &gate))
        .build();

    let run = tokio::spawn({
        let graph = graph.clone();
        async move { graph.run(RunOptions::default()).await }
    });
    with_timeout(wait_for_state(&graph, "stuck", ActionState::Running)).await;

    run.abort();
    let _ = run.await;

    with_timeout(async {
        while graph.is_running() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    graph.add_action(noop_action("after_abort", &[]))?;

    gate.open();
    Ok(())
}
