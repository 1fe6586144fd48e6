// src/engine/worker.rs

//! Runs a single action body on a Tokio task.

use std::any::Any;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{debug, error, warn};

use crate::action::{ActionBody, ActionFailure, ActionId, ActionInputs, ActionValue, SkipAction};
use crate::engine::context::Completion;
use crate::engine::RunEvent;

/// Spawn the body of `id` and report its completion on `tx`.
///
/// Exactly one `RunEvent::Completed` is sent per call, including when the
/// body returns an error or panics.
pub(crate) fn spawn_action(
    run_id: u64,
    id: ActionId,
    body: Arc<dyn ActionBody>,
    inputs: ActionInputs,
    tx: mpsc::Sender<RunEvent>,
) {
    tokio::spawn(async move {
        // The body runs on its own task so a panic surfaces as a JoinError
        // here instead of tearing down the worker.
        let body_task = tokio::spawn(async move { body.execute(inputs).await });
        let completion = completion_from(run_id, &id, body_task.await);

        if tx.send(RunEvent::Completed { id: id.clone(), completion }).await.is_err() {
            debug!(run_id, action = %id, "run coordinator gone; dropping completion");
        }
    });
}

fn completion_from(
    run_id: u64,
    id: &ActionId,
    joined: Result<anyhow::Result<ActionValue>, JoinError>,
) -> Completion {
    match joined {
        Ok(Ok(value)) => Completion::Succeeded(value),
        Ok(Err(err)) => match err.downcast_ref::<SkipAction>() {
            Some(skip) => Completion::Declined(skip.reason().to_string()),
            None => Completion::Failed(ActionFailure::Error(err)),
        },
        Err(join_err) if join_err.is_panic() => {
            let message = panic_message(join_err.into_panic());
            error!(run_id, action = %id, panic = %message, "action body panicked");
            Completion::Failed(ActionFailure::Panicked(message))
        }
        Err(join_err) => {
            warn!(run_id, action = %id, error = %join_err, "action task was cancelled");
            Completion::Failed(ActionFailure::Error(anyhow::anyhow!(
                "action task was cancelled: {join_err}"
            )))
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "non-string panic payload".to_string(),
        },
    }
}
