use serde::{Deserialize, Serialize};

/// Execution state of a single task.
///
/// A task moves along exactly one of two paths:
/// `Queued → Running → {Completed | Failed}` or `Queued → Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    /// Task is waiting in the queue for a free slot.
    Queued,
    /// Task holds a slot and its processing function is executing.
    Running,
    /// Processing function returned a result.
    Completed,
    /// Processing function failed, timed out or panicked.
    Failed,
    /// Task was still queued when the run was stopped.
    Cancelled,
}

impl TaskStatus {
    /// Returns `true` if the task is in a terminal state (won't transition further).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Returns `true` if the task is still active (queued or running).
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Queued | TaskStatus::Running)
    }

    /// Returns `true` if `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Queued, TaskStatus::Running)
                | (TaskStatus::Queued, TaskStatus::Cancelled)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        )
    }
}
