//! The result protocol every stage return value satisfies.

use super::Outcome;
use crate::errors::FUNCTION_FAILED;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;

/// A stage result that has not resolved yet.
pub type PendingResult = BoxFuture<'static, StageResult>;

/// The value a stage hands back to the executor.
pub enum StageResult {
    /// Proceed to the next stage.
    Continue,
    /// Stop the run with this outcome (`200` succeeds, anything else fails).
    Done(Outcome),
    /// Resolve this first, then apply the resolved value at the same index.
    Pending(PendingResult),
    /// The stage produced nothing usable.
    Declined,
}

impl StageResult {
    /// Creates a terminal result.
    #[must_use]
    pub fn done(code: u16, message: impl Into<String>) -> Self {
        Self::Done(Outcome::new(code, message))
    }

    /// Wraps a future as a pending result.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = StageResult> + Send + 'static,
    {
        Self::Pending(Box::pin(future))
    }

    /// Returns true for `Continue`.
    #[must_use]
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }

    /// Returns true for `Pending`.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl From<bool> for StageResult {
    fn from(value: bool) -> Self {
        if value {
            Self::Continue
        } else {
            Self::Declined
        }
    }
}

impl From<Outcome> for StageResult {
    fn from(outcome: Outcome) -> Self {
        Self::Done(outcome)
    }
}

impl From<Option<Outcome>> for StageResult {
    fn from(outcome: Option<Outcome>) -> Self {
        outcome.map_or(Self::Declined, Self::Done)
    }
}

impl fmt::Debug for StageResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => write!(f, "Continue"),
            Self::Done(outcome) => f.debug_tuple("Done").field(outcome).finish(),
            Self::Pending(_) => write!(f, "Pending(..)"),
            Self::Declined => write!(f, "Declined"),
        }
    }
}

/// What the executor does with a result.
pub enum Transition {
    /// Move to the next index.
    Advance,
    /// Enter the succeeded state with this payload.
    Succeed(Outcome),
    /// Enter the failed state with this failure.
    Fail(Outcome),
    /// Suspend at the current index until the future resolves.
    Suspend(PendingResult),
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advance => write!(f, "Advance"),
            Self::Succeed(outcome) => f.debug_tuple("Succeed").field(outcome).finish(),
            Self::Fail(outcome) => f.debug_tuple("Fail").field(outcome).finish(),
            Self::Suspend(_) => write!(f, "Suspend(..)"),
        }
    }
}

/// Maps a stage result onto an executor transition.
///
/// `prefix` names the component in generic failure messages
/// (`"FernError: Function failed"`).
#[must_use]
pub fn resolve(result: StageResult, prefix: &str) -> Transition {
    match result {
        StageResult::Continue => Transition::Advance,
        StageResult::Done(outcome) if outcome.is_success() => Transition::Succeed(outcome),
        StageResult::Done(outcome) => Transition::Fail(outcome),
        StageResult::Pending(future) => Transition::Suspend(future),
        StageResult::Declined => {
            Transition::Fail(Outcome::new(500, format!("{prefix}: {FUNCTION_FAILED}")))
        }
    }
}
