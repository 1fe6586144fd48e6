// src/lib.rs

//! Dependency-graph execution engine.
//!
//! Build an [`ActionGraph`] of [`Action`]s, then run it with a
//! [`Scheduler`]. Independent actions run concurrently on Tokio tasks, every
//! action starts only after all of its dependencies succeeded, and failures
//! are reported per action in a [`RunOutcome`].
//!
//! ```no_run
//! use action_graph::{Action, ActionGraph, RunOptions, action_fn};
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), action_graph::GraphError> {
//! let graph = ActionGraph::new();
//! graph.add_action(Action::new("fetch", action_fn(|_| async { Ok(json!(3)) })))?;
//! graph.add_action(
//!     Action::new(
//!         "double",
//!         action_fn(|inputs| async move {
//!             let n = inputs.get("fetch").and_then(|v| v.as_i64()).unwrap_or(0);
//!             Ok(json!(n * 2))
//!         }),
//!     )
//!     .depends_on("fetch"),
//! )?;
//!
//! let outcome = graph.run(RunOptions::default()).await?;
//! assert_eq!(outcome.value("double"), Some(&json!(6)));
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

pub use crate::action::{
    Action, ActionBody, ActionFailure, ActionId, ActionInputs, ActionOutcome, ActionState,
    ActionValue, SkipAction, SkipReason, action_fn, blocking_fn,
};
pub use crate::dag::ActionGraph;
pub use crate::engine::{
    CancelHandle, ExecutionSnapshot, RunOptions, RunOutcome, RunStatus, Scheduler,
};
pub use crate::errors::{ConfigError, GraphError};
pub use crate::types::{FailurePolicy, Parallelism};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::GraphFile;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - graph-file loading and validation
/// - CLI overrides of the `[run]` section
/// - the scheduler
/// - Ctrl-C handling (cancels the run)
pub async fn run(args: CliArgs) -> Result<RunStatus> {
    let graph_path = PathBuf::from(&args.graph);
    let file = load_and_validate(&graph_path)
        .with_context(|| format!("loading graph file '{}'", graph_path.display()))?;
    let graph = file
        .build_graph()
        .with_context(|| format!("building graph from '{}'", graph_path.display()))?;
    let options = resolve_run_options(&args, &file);

    if args.dry_run {
        print_dry_run(&graph, &file, &options)?;
        return Ok(RunStatus::AllSucceeded);
    }

    let scheduler = Scheduler::new(options);

    // Ctrl-C → stop dispatching, let running actions finish.
    {
        let cancel = scheduler.cancel_handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; cancelling run");
            cancel.cancel();
        });
    }

    let outcome = scheduler.run(&graph).await?;
    print_report(&outcome);
    Ok(outcome.status())
}

/// Run options from the `[run]` section, with CLI flags taking precedence.
pub fn resolve_run_options(args: &CliArgs, file: &GraphFile) -> RunOptions {
    let mut options = file.run_options();
    if let Some(n) = args.max_parallelism {
        options.max_parallelism = Parallelism::from(n);
    }
    if let Some(policy) = args.on_failure {
        options.on_failure = policy;
    }
    if let Some(timeout) = args.timeout {
        options.timeout = Some(timeout);
    }
    if args.lenient {
        options.lenient = true;
    }
    options
}

/// Print the actions in one valid execution order with their settings.
fn print_dry_run(graph: &ActionGraph, file: &GraphFile, options: &RunOptions) -> Result<()> {
    println!("action-graph dry-run");
    println!("  run.max_parallelism = {}", options.max_parallelism);
    println!("  run.on_failure = {}", options.on_failure);
    if let Some(timeout) = options.timeout {
        println!("  run.timeout = {timeout:?}");
    }
    println!("  run.lenient = {}", options.lenient);
    println!();

    let order = graph.topological_order()?;
    println!("actions ({}):", order.len());
    for id in &order {
        println!("  - {id}");
        if let Some(action) = file.action.get(id.as_str()) {
            println!("      cmd: {}", action.cmd);
            if !action.after.is_empty() {
                println!("      after: {:?}", action.after);
            }
            if action.priority != action::DEFAULT_PRIORITY {
                println!("      priority: {}", action.priority);
            }
            if let Some(code) = action.skip_exit_code {
                println!("      skip_exit_code: {code}");
            }
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

fn print_report(outcome: &RunOutcome) {
    for (id, result) in outcome.iter() {
        match result {
            ActionOutcome::Succeeded(value) => println!("ok      {id}  {value}"),
            ActionOutcome::Failed(failure) => println!("failed  {id}  {failure}"),
            ActionOutcome::Skipped(reason) => println!("skipped {id}  {reason}"),
        }
    }

    let counts = outcome.counts();
    println!(
        "\n{}: {} succeeded, {} failed, {} skipped in {:.2?}",
        outcome.status(),
        counts.succeeded,
        counts.failed,
        counts.skipped,
        outcome.elapsed()
    );
}
