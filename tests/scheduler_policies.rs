mod common;
use crate::common::builders::{GraphBuilder, value_action};
use crate::common::probes::{Gate, Probe, ProbeEvent};
use crate::common::{init_tracing, wait_for_state, with_timeout};

use std::error::Error;

use action_graph::{
    Action, ActionFailure, ActionGraph, ActionId, ActionInputs, ActionState, FailurePolicy,
    RunOptions, RunStatus, SkipReason, action_fn,
};
use serde_json::json;

type TestResult = Result<(), Box<dyn Error>>;

fn diamond(probe: &Probe) -> ActionGraph {
    //     root
    //    /    \
    //  left  right
    //    \    /
    //     join
    GraphBuilder::new()
        .action(probe.action("root", &[]))
        .action(probe.action("left", &["root"]))
        .action(probe.action("right", &["root"]))
        .action(probe.action("join", &["left", "right"]))
        .build()
}

#[tokio::test]
async fn diamond_runs_in_dependency_order() -> TestResult {
    init_tracing();
    let probe = Probe::new();
    let graph = diamond(&probe);

    let outcome = with_timeout(graph.run(RunOptions::default())).await?;

    assert_eq!(outcome.status(), RunStatus::AllSucceeded);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(outcome.counts().succeeded, 4);

    let root_done = probe.position(&ProbeEvent::Finished("root".into())).unwrap();
    for branch in ["left", "right"] {
        let started = probe.position(&ProbeEvent::Started(branch.into())).unwrap();
        assert!(root_done < started, "{branch} started before root finished");
    }

    let join_started = probe.position(&ProbeEvent::Started("join".into())).unwrap();
    for branch in ["left", "right"] {
        let finished = probe.position(&ProbeEvent::Finished(branch.into())).unwrap();
        assert!(finished < join_started, "join started before {branch} finished");
    }

    Ok(())
}

#[tokio::test]
async fn body_receives_only_direct_dependency_results() -> TestResult {
    init_tracing();
    let probe = Probe::new();
    let graph = diamond(&probe);

    let outcome = with_timeout(graph.run(RunOptions::default())).await?;
    assert!(outcome.status().is_success());

    let inputs = probe.inputs_of("join").unwrap();
    assert_eq!(inputs.len(), 2);
    assert_eq!(inputs.get("left"), Some(&json!("left")));
    assert_eq!(inputs.get("right"), Some(&json!("right")));
    assert!(!inputs.contains("root"));

    assert!(probe.inputs_of("root").unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn results_flow_into_dependents() -> TestResult {
    let graph = ActionGraph::new();
    graph.add_action(value_action("two", &[], json!(2)))?;
    graph.add_action(value_action("three", &[], json!(3)))?;
    graph.add_action(
        Action::new(
            "sum",
            action_fn(|inputs: ActionInputs| async move {
                let total: i64 = inputs.iter().filter_map(|(_, v)| v.as_i64()).sum();
                Ok(json!(total))
            }),
        )
        .with_dependencies(["two", "three"]),
    )?;

    let outcome = with_timeout(graph.run(RunOptions::default())).await?;

    assert_eq!(outcome.value("sum"), Some(&json!(5)));
    assert_eq!(outcome.value("two"), Some(&json!(2)));
    Ok(())
}

#[tokio::test]
async fn fail_fast_skips_dependents_and_halts_the_rest() -> TestResult {
    init_tracing();
    let probe = Probe::new();
    let gate = Gate::new();
    let graph = GraphBuilder::new()
        .action(probe.failing_action("bad", &[], "kaput"))
        .action(probe.gated_action("slow", &[], &gate))
        .action(probe.action("child", &["bad"]))
        .action(probe.action("after_slow", &["slow"]))
        .build();

    let run = tokio::spawn({
        let graph = graph.clone();
        async move { graph.run(RunOptions::default()).await }
    });

    // `slow` is in flight when `bad` fails; let it finish afterwards.
    with_timeout(wait_for_state(&graph, "bad", ActionState::Failed)).await;
    gate.open();

    let outcome = with_timeout(run).await??;

    assert_eq!(outcome.status(), RunStatus::PartialFailure);
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(outcome.failed(), vec!["bad"]);
    assert_eq!(outcome.succeeded(), vec!["slow"]);
    assert_eq!(
        outcome.skip_reason("child"),
        Some(&SkipReason::UpstreamFailed(ActionId::from("bad")))
    );
    assert_eq!(
        outcome.skip_reason("after_slow"),
        Some(&SkipReason::Halted(ActionId::from("bad")))
    );

    assert!(!probe.has_started("child"));
    assert!(!probe.has_started("after_slow"));
    Ok(())
}

#[tokio::test]
async fn continue_policy_runs_independent_branches() -> TestResult {
    init_tracing();
    let probe = Probe::new();
    let graph = GraphBuilder::new()
        .action(probe.failing_action("bad", &[], "kaput"))
        .action(probe.action("slow", &[]))
        .action(probe.action("child", &["bad"]))
        .action(probe.action("after_slow", &["slow"]))
        .build();

    let options = RunOptions::default().with_failure_policy(FailurePolicy::Continue);
    let outcome = with_timeout(graph.run(options)).await?;

    assert_eq!(outcome.status(), RunStatus::PartialFailure);
    assert_eq!(outcome.succeeded(), vec!["slow", "after_slow"]);
    assert_eq!(outcome.failed(), vec!["bad"]);
    assert_eq!(outcome.skipped(), vec!["child"]);
    assert_eq!(
        outcome.skip_reason("child"),
        Some(&SkipReason::UpstreamFailed(ActionId::from("bad")))
    );
    Ok(())
}

#[tokio::test]
async fn diamond_with_failing_branch_under_continue() -> TestResult {
    let probe = Probe::new();
    let graph = GraphBuilder::new()
        .action(probe.action("root", &[]))
        .action(probe.failing_action("left", &["root"], "left broke"))
        .action(probe.action("right", &["root"]))
        .action(probe.action("join", &["left", "right"]))
        .build();

    let options = RunOptions::default().with_failure_policy(FailurePolicy::Continue);
    let outcome = with_timeout(graph.run(options)).await?;

    assert_eq!(outcome.state_of("root"), Some(ActionState::Succeeded));
    assert_eq!(outcome.state_of("left"), Some(ActionState::Failed));
    assert_eq!(outcome.state_of("right"), Some(ActionState::Succeeded));
    assert_eq!(outcome.state_of("join"), Some(ActionState::Skipped));
    assert!(!probe.has_started("join"));
    Ok(())
}

#[tokio::test]
async fn failure_skips_transitive_dependents_naming_the_failed_action() -> TestResult {
    let probe = Probe::new();
    let graph = GraphBuilder::new()
        .action(probe.failing_action("bad", &[], "kaput"))
        .action(probe.action("c1", &["bad"]))
        .action(probe.action("c2", &["c1"]))
        .action(probe.action("c3", &["c2", "c1"]))
        .build();

    let options = RunOptions::default().with_failure_policy(FailurePolicy::Continue);
    let outcome = with_timeout(graph.run(options)).await?;

    let expected = SkipReason::UpstreamFailed(ActionId::from("bad"));
    for id in ["c1", "c2", "c3"] {
        assert_eq!(outcome.skip_reason(id), Some(&expected), "{id}");
    }
    assert_eq!(probe.started(), vec!["bad"]);
    Ok(())
}

#[tokio::test]
async fn action_error_is_preserved() -> TestResult {
    let graph = ActionGraph::new();
    graph.add_action(Action::new(
        "io",
        action_fn(|_| async {
            let err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
            Err(anyhow::Error::new(err).context("reading input"))
        }),
    ))?;

    let outcome = with_timeout(graph.run(RunOptions::default())).await?;

    let failure = outcome.failure("io").unwrap();
    assert_eq!(failure.to_string(), "reading input: no such file");
    let source = failure.source_error().unwrap();
    let io = source.downcast_ref::<std::io::Error>().unwrap();
    assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
    Ok(())
}

#[tokio::test]
async fn panicking_body_is_captured_as_failure() -> TestResult {
    init_tracing();
    let probe = Probe::new();
    let graph = GraphBuilder::new()
        .action(probe.panicking_action("boom", &[], "exploded"))
        .action(probe.action("fine", &[]))
        .action(probe.action("after_boom", &["boom"]))
        .build();

    let options = RunOptions::default().with_failure_policy(FailurePolicy::Continue);
    let outcome = with_timeout(graph.run(options)).await?;

    match outcome.failure("boom") {
        Some(ActionFailure::Panicked(message)) => assert!(message.contains("exploded")),
        other => panic!("expected Panicked, got {other:?}"),
    }
    assert_eq!(outcome.state_of("fine"), Some(ActionState::Succeeded));
    assert_eq!(
        outcome.skip_reason("after_boom"),
        Some(&SkipReason::UpstreamFailed(ActionId::from("boom")))
    );
    Ok(())
}

#[tokio::test]
async fn declined_action_skips_dependents_in_strict_mode() -> TestResult {
    let probe = Probe::new();
    let graph = GraphBuilder::new()
        .action(probe.declining_action("maybe", &[], "nothing to do"))
        .action(probe.action("next", &["maybe"]))
        .build();

    let outcome = with_timeout(graph.run(RunOptions::default())).await?;

    assert_eq!(
        outcome.skip_reason("maybe"),
        Some(&SkipReason::Declined("nothing to do".to_string()))
    );
    assert_eq!(
        outcome.skip_reason("next"),
        Some(&SkipReason::UpstreamSkipped(ActionId::from("maybe")))
    );
    assert_eq!(outcome.status(), RunStatus::PartialFailure);
    assert!(!probe.has_started("next"));
    Ok(())
}

#[tokio::test]
async fn lenient_mode_treats_declined_dependency_as_satisfied() -> TestResult {
    let probe = Probe::new();
    let graph = GraphBuilder::new()
        .action(probe.declining_action("maybe", &[], "nothing to do"))
        .action(probe.action("other", &[]))
        .action(probe.action("next", &["maybe", "other"]))
        .build();

    let outcome = with_timeout(graph.run(RunOptions::default().lenient(true))).await?;

    assert_eq!(outcome.state_of("maybe"), Some(ActionState::Skipped));
    assert_eq!(outcome.state_of("next"), Some(ActionState::Succeeded));

    let inputs = probe.inputs_of("next").unwrap();
    assert!(!inputs.contains("maybe"));
    assert_eq!(inputs.get("other"), Some(&json!("other")));

    // A skipped action still means not everything succeeded.
    assert_eq!(outcome.status(), RunStatus::PartialFailure);
    Ok(())
}

#[tokio::test]
async fn fail_fast_with_no_successes_is_partial_failure() -> TestResult {
    let probe = Probe::new();
    let graph = GraphBuilder::new()
        .action(probe.failing_action("only", &[], "nope"))
        .action(probe.action("child", &["only"]))
        .build();

    let outcome = with_timeout(graph.run(RunOptions::default())).await?;

    assert_eq!(outcome.status(), RunStatus::PartialFailure);
    assert_eq!(outcome.counts().failed, 1);
    assert_eq!(outcome.counts().skipped, 1);
    Ok(())
}

#[tokio::test]
async fn empty_graph_succeeds_vacuously() -> TestResult {
    let graph = ActionGraph::new();

    let outcome = with_timeout(graph.run(RunOptions::default())).await?;

    assert_eq!(outcome.status(), RunStatus::AllSucceeded);
    assert!(outcome.is_empty());
    Ok(())
}

#[tokio::test]
async fn outcome_has_entry_for_every_registered_action() -> TestResult {
    let probe = Probe::new();
    let graph = GraphBuilder::new()
        .action(probe.failing_action("a", &[], "x"))
        .action(probe.action("b", &["a"]))
        .action(probe.action("c", &[]))
        .action(probe.action("d", &["c"]))
        .build();

    let outcome = with_timeout(graph.run(RunOptions::default())).await?;

    assert_eq!(outcome.len(), 4);
    let ids: Vec<_> = outcome.iter().map(|(id, _)| id.clone()).collect();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
    for (_, result) in outcome.iter() {
        assert!(result.state().is_terminal());
    }
    Ok(())
}
