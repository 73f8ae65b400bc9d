//! Run lifecycle state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of the (single) retry run owned by the engine.
///
/// `Idle -> Running` is the only entry. `Running` may move to `Stopping`,
/// `Succeeded` or `Failed`. `Stopping` normally ends in `Stopped`, unless the
/// attempt that was in flight when the stop arrived resolves to a success or
/// a fatal error; that outcome is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// No run has been started yet
    #[default]
    Idle,
    /// Attempt loop is active
    Running,
    /// Stop requested, waiting for the loop checkpoint
    Stopping,
    /// Stopped by request
    Stopped,
    /// An instance was created
    Succeeded,
    /// A fatal provider response ended the run
    Failed,
}

impl RunState {
    /// Terminal states require a fresh run to re-enter `Running`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Stopped | RunState::Succeeded | RunState::Failed)
    }

    /// A loop task exists for the current run.
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Running | RunState::Stopping)
    }

    /// Whether `start` is permitted from this state.
    pub fn can_start(&self) -> bool {
        !self.is_active()
    }

    /// Whether moving to `next` is a legal transition within one run.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Running, Stopping)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Stopping, Stopped)
                | (Stopping, Succeeded)
                | (Stopping, Failed)
        ) || (self.can_start() && next == Running)
    }

    /// Lowercase label used in status output
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Stopping => "stopping",
            RunState::Stopped => "stopped",
            RunState::Succeeded => "succeeded",
            RunState::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
