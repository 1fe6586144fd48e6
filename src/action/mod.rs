// src/action/mod.rs

//! Actions: named units of work with declared dependencies.
//!
//! - [`id`] defines [`ActionId`], the unique name of an action in a graph.
//! - [`inputs`] holds [`ActionInputs`], the dependency results handed to a
//!   body when it runs.
//! - [`outcome`] defines per-run [`ActionState`]s and terminal
//!   [`ActionOutcome`]s.
//!
//! Bodies are anything implementing [`ActionBody`]. Closures returning a
//! future can be adapted with [`action_fn`], synchronous closures with
//! [`blocking_fn`].

pub mod id;
pub mod inputs;
pub mod outcome;

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

pub use id::ActionId;
pub use inputs::ActionInputs;
pub use outcome::{ActionFailure, ActionOutcome, ActionState, SkipReason};

/// Value produced by a successful action.
pub type ActionValue = serde_json::Value;

/// Boxed future returned by [`ActionBody::execute`].
pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<ActionValue>> + Send + 'a>>;

/// Priority used when none is given. Lower values are dispatched first.
pub const DEFAULT_PRIORITY: i32 = 0;

/// The work an action performs.
///
/// The engine only observes completion. A body may block, await, or spawn
/// its own work; bodies of independent actions may run concurrently, so any
/// shared external resource is the body's responsibility.
///
/// `execute` is polled on a Tokio task. Blocking work must not run on that
/// task directly: on a current-thread runtime it would stall the scheduler,
/// including cancellation and timeouts. Move it onto the blocking pool with
/// `tokio::task::spawn_blocking`, or wrap a synchronous closure with
/// [`blocking_fn`].
///
/// Returning `Err` marks the action Failed. Returning an error that wraps
/// [`SkipAction`] marks it Skipped instead.
pub trait ActionBody: Send + Sync {
    fn execute(&self, inputs: ActionInputs) -> ActionFuture<'_>;
}

/// [`ActionBody`] backed by a closure. Built with [`action_fn`].
pub struct FnBody<F> {
    f: F,
}

impl<F, Fut> ActionBody for FnBody<F>
where
    F: Fn(ActionInputs) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ActionValue>> + Send + 'static,
{
    fn execute(&self, inputs: ActionInputs) -> ActionFuture<'_> {
        Box::pin((self.f)(inputs))
    }
}

/// Adapt an async closure into an [`ActionBody`].
///
/// ```
/// use action_graph::action::{action_fn, Action};
///
/// let action = Action::new(
///     "answer",
///     action_fn(|_inputs| async { Ok(serde_json::json!(42)) }),
/// );
/// assert_eq!(action.id().as_str(), "answer");
/// ```
pub fn action_fn<F, Fut>(f: F) -> FnBody<F>
where
    F: Fn(ActionInputs) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<ActionValue>> + Send + 'static,
{
    FnBody { f }
}

/// [`ActionBody`] backed by a synchronous closure run on Tokio's blocking
/// pool. Built with [`blocking_fn`].
pub struct BlockingFnBody<F> {
    f: Arc<F>,
}

impl<F> ActionBody for BlockingFnBody<F>
where
    F: Fn(ActionInputs) -> anyhow::Result<ActionValue> + Send + Sync + 'static,
{
    fn execute(&self, inputs: ActionInputs) -> ActionFuture<'_> {
        let f = Arc::clone(&self.f);
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || (*f)(inputs)).await {
                Ok(result) => result,
                // Re-raised so the worker records it as a panic.
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => Err(anyhow::anyhow!("blocking action task was cancelled: {err}")),
            }
        })
    }
}

/// Adapt a synchronous, possibly blocking closure into an [`ActionBody`].
pub fn blocking_fn<F>(f: F) -> BlockingFnBody<F>
where
    F: Fn(ActionInputs) -> anyhow::Result<ActionValue> + Send + Sync + 'static,
{
    BlockingFnBody { f: Arc::new(f) }
}

/// Error a body returns to decline running.
///
/// The action ends Skipped with [`SkipReason::Declined`] instead of Failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct SkipAction {
    reason: String,
}

impl SkipAction {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// An action as registered in a graph: id, dependencies, priority and body.
#[derive(Clone)]
pub struct Action {
    id: ActionId,
    dependencies: BTreeSet<ActionId>,
    priority: i32,
    body: Arc<dyn ActionBody>,
}

impl Action {
    pub fn new(id: impl Into<ActionId>, body: impl ActionBody + 'static) -> Self {
        Self::from_shared(id, Arc::new(body))
    }

    /// Build an action around a body that is shared with other actions.
    pub fn from_shared(id: impl Into<ActionId>, body: Arc<dyn ActionBody>) -> Self {
        Self {
            id: id.into(),
            dependencies: BTreeSet::new(),
            priority: DEFAULT_PRIORITY,
            body,
        }
    }

    /// Declare dependencies. The ids may be registered later, but must all
    /// exist by the time the graph is validated.
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ActionId>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn depends_on(self, dep: impl Into<ActionId>) -> Self {
        self.with_dependencies([dep])
    }

    /// Dispatch hint among simultaneously ready actions: lower runs first.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn id(&self) -> &ActionId {
        &self.id
    }

    pub fn dependencies(&self) -> &BTreeSet<ActionId> {
        &self.dependencies
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn body(&self) -> &Arc<dyn ActionBody> {
        &self.body
    }

    pub(crate) fn add_dependency(&mut self, dep: ActionId) -> bool {
        self.dependencies.insert(dep)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
