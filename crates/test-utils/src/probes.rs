//! Action bodies that record what the scheduler did with them.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use action_graph::{Action, ActionInputs, ActionValue, SkipAction, action_fn};
use anyhow::anyhow;
use serde_json::json;
use tokio::sync::Notify;

/// One observation made by a [`Probe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    Started(String),
    Finished(String),
}

#[derive(Default)]
struct ProbeInner {
    events: Mutex<Vec<ProbeEvent>>,
    inputs: Mutex<Vec<(String, ActionInputs)>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

/// Shared recorder for action bodies.
///
/// Every action built through a probe records when it started and finished,
/// the inputs it received, and the peak number of probe actions running at
/// the same time.
#[derive(Clone, Default)]
pub struct Probe {
    inner: Arc<ProbeInner>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Succeeds with its own id after `delay`.
    pub fn action_with_delay(&self, id: &str, deps: &[&str], delay: Duration) -> Action {
        let probe = self.clone();
        let name = id.to_string();
        Action::new(
            id,
            action_fn(move |inputs| {
                let probe = probe.clone();
                let name = name.clone();
                async move {
                    probe.enter(&name, inputs);
                    tokio::time::sleep(delay).await;
                    probe.leave(&name);
                    Ok(json!(name))
                }
            }),
        )
        .with_dependencies(deps.iter().copied())
    }

    /// Succeeds with its own id after a short pause.
    pub fn action(&self, id: &str, deps: &[&str]) -> Action {
        self.action_with_delay(id, deps, Duration::from_millis(10))
    }

    /// Fails with `message` after a short pause.
    pub fn failing_action(&self, id: &str, deps: &[&str], message: &str) -> Action {
        let probe = self.clone();
        let name = id.to_string();
        let message = message.to_string();
        Action::new(
            id,
            action_fn(move |inputs| {
                let probe = probe.clone();
                let name = name.clone();
                let message = message.clone();
                async move {
                    probe.enter(&name, inputs);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    probe.leave(&name);
                    Err(anyhow!(message))
                }
            }),
        )
        .with_dependencies(deps.iter().copied())
    }

    /// Panics with `message`.
    pub fn panicking_action(&self, id: &str, deps: &[&str], message: &str) -> Action {
        let probe = self.clone();
        let name = id.to_string();
        let message = message.to_string();
        Action::new(
            id,
            action_fn(move |inputs| {
                probe.enter(&name, inputs);
                probe.leave(&name);
                explode(message.clone())
            }),
        )
        .with_dependencies(deps.iter().copied())
    }

    /// Declines to run with `reason`.
    pub fn declining_action(&self, id: &str, deps: &[&str], reason: &str) -> Action {
        let probe = self.clone();
        let name = id.to_string();
        let reason = reason.to_string();
        Action::new(
            id,
            action_fn(move |inputs| {
                let probe = probe.clone();
                let name = name.clone();
                let reason = reason.clone();
                async move {
                    probe.enter(&name, inputs);
                    probe.leave(&name);
                    Err(anyhow::Error::new(SkipAction::new(reason)))
                }
            }),
        )
        .with_dependencies(deps.iter().copied())
    }

    /// Starts, then waits until `gate` is opened before succeeding.
    pub fn gated_action(&self, id: &str, deps: &[&str], gate: &Gate) -> Action {
        let probe = self.clone();
        let name = id.to_string();
        let gate = gate.clone();
        Action::new(
            id,
            action_fn(move |inputs| {
                let probe = probe.clone();
                let name = name.clone();
                let gate = gate.clone();
                async move {
                    probe.enter(&name, inputs);
                    gate.wait().await;
                    probe.leave(&name);
                    Ok(json!(name))
                }
            }),
        )
        .with_dependencies(deps.iter().copied())
    }

    pub fn events(&self) -> Vec<ProbeEvent> {
        self.inner.events.lock().unwrap().clone()
    }

    /// Ids in the order their bodies started.
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProbeEvent::Started(id) => Some(id),
                ProbeEvent::Finished(_) => None,
            })
            .collect()
    }

    /// Ids in the order their bodies finished.
    pub fn finished(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProbeEvent::Finished(id) => Some(id),
                ProbeEvent::Started(_) => None,
            })
            .collect()
    }

    pub fn has_started(&self, id: &str) -> bool {
        self.started().iter().any(|s| s == id)
    }

    /// Position of `event` in the event log.
    pub fn position(&self, event: &ProbeEvent) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    /// Inputs the body of `id` received, if it ran.
    pub fn inputs_of(&self, id: &str) -> Option<ActionInputs> {
        self.inner
            .inputs
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| name == id)
            .map(|(_, inputs)| inputs.clone())
    }

    /// Largest number of probe bodies that were running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    /// Poll until the body of `id` has started.
    pub async fn wait_until_started(&self, id: &str) {
        while !self.has_started(id) {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    fn enter(&self, id: &str, inputs: ActionInputs) {
        self.inner
            .events
            .lock()
            .unwrap()
            .push(ProbeEvent::Started(id.to_string()));
        self.inner
            .inputs
            .lock()
            .unwrap()
            .push((id.to_string(), inputs));
        let now = self.inner.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self, id: &str) {
        self.inner.running.fetch_sub(1, Ordering::SeqCst);
        self.inner
            .events
            .lock()
            .unwrap()
            .push(ProbeEvent::Finished(id.to_string()));
    }
}

async fn explode(message: String) -> anyhow::Result<ActionValue> {
    panic!("{message}")
}

/// One-shot latch that gated actions wait on.
#[derive(Clone, Default)]
pub struct Gate {
    open: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release every current and future waiter.
    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.open.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}
