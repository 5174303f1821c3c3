use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a batch run: `Idle → Running → {Completed | Stopped}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    /// Tasks may be enqueued; nothing has been dispatched yet.
    Idle,
    /// Dispatch has begun.
    Running,
    /// Every task settled without `stop` being called.
    Completed,
    /// `stop` was called; remaining queued tasks were cancelled.
    Stopped,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
