// src/types.rs

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use serde::Deserialize;

/// What the scheduler does once an action has failed.
///
/// - `FailFast`: stop dispatching new actions; everything that has not
///   started yet ends up Skipped. In-flight actions are allowed to finish
///   (default behaviour).
/// - `Continue`: keep running independent branches; only the transitive
///   dependents of the failed action are Skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    FailFast,
    Continue,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::FailFast
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Ok(FailurePolicy::FailFast),
            "continue" => Ok(FailurePolicy::Continue),
            other => Err(format!(
                "invalid failure policy: {other} (expected \"fail-fast\" or \"continue\")"
            )),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::FailFast => f.write_str("fail-fast"),
            FailurePolicy::Continue => f.write_str("continue"),
        }
    }
}

/// Upper bound on the number of actions running at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parallelism {
    #[default]
    Unbounded,
    Bounded(NonZeroUsize),
}

impl Parallelism {
    /// `None` means no limit.
    pub fn limit(self) -> Option<usize> {
        match self {
            Parallelism::Unbounded => None,
            Parallelism::Bounded(n) => Some(n.get()),
        }
    }

    /// Whether another action may start while `running` are in flight.
    pub fn allows(self, running: usize) -> bool {
        self.limit().is_none_or(|limit| running < limit)
    }
}

/// `0` is the conventional spelling of "unbounded" in config files and on
/// the command line.
impl From<usize> for Parallelism {
    fn from(n: usize) -> Self {
        match NonZeroUsize::new(n) {
            Some(n) => Parallelism::Bounded(n),
            None => Parallelism::Unbounded,
        }
    }
}

impl fmt::Display for Parallelism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parallelism::Unbounded => f.write_str("unbounded"),
            Parallelism::Bounded(n) => write!(f, "{n}"),
        }
    }
}
