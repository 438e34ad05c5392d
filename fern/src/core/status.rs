//! The executor's run state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a pipeline run currently is.
///
/// `Idle → Running(i) → {Running(i+1), Suspended(i), Succeeded, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "index", rename_all = "snake_case")]
pub enum RunState {
    /// Not started.
    Idle,
    /// Executing the stage at this index.
    Running(usize),
    /// Waiting on a pending result from the stage at this index.
    Suspended(usize),
    /// Finished with a success emission.
    Succeeded,
    /// Finished with a failure emission.
    Failed,
}

impl Default for RunState {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running(i) => write!(f, "running({i})"),
            Self::Suspended(i) => write!(f, "suspended({i})"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl RunState {
    /// Returns true if the state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true if the run succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns the stage index for running and suspended states.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Running(i) | Self::Suspended(i) => Some(*i),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_state_display() {
        assert_eq!(RunState::Idle.to_string(), "idle");
        assert_eq!(RunState::Running(2).to_string(), "running(2)");
        assert_eq!(RunState::Suspended(0).to_string(), "suspended(0)");
        assert_eq!(RunState::Failed.to_string(), "failed");
    }

    #[test]
    fn test_run_state_is_terminal() {
        assert!(RunState::Succeeded.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Idle.is_terminal());
        assert!(!RunState::Suspended(1).is_terminal());
    }

    #[test]
    fn test_run_state_index() {
        assert_eq!(RunState::Running(3).index(), Some(3));
        assert_eq!(RunState::Succeeded.index(), None);
    }

    #[test]
    fn test_run_state_serialize() {
        let json = serde_json::to_string(&RunState::Running(1)).unwrap();
        assert_eq!(json, r#"{"state":"running","index":1}"#);

        let json = serde_json::to_string(&RunState::Succeeded).unwrap();
        assert_eq!(json, r#"{"state":"succeeded"}"#);
    }
}
