//! Typed batch events and the listener interface.
//!
//! Events are published under the controller's run lock and delivered strictly in
//! publication order, so subscribers see:
//! - `TaskFailed` before the `Progress` of the same settlement;
//! - a non-decreasing `overall_progress`;
//! - exactly one `BatchSettled`, last.

mod bus;
pub(crate) use bus::Bus;

mod callbacks;
pub use callbacks::Callbacks;

mod channel;
pub use channel::ChannelSubscriber;

use batchkit_model::{BatchId, BatchStats, ProgressSnapshot, RunState, TaskError, TaskInfo};

/// Something that happened in a batch run.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    /// A task was dispatched and holds a slot.
    TaskStarted { batch: BatchId, task: TaskInfo },
    /// A task's processing function failed.
    TaskFailed {
        batch: BatchId,
        task: TaskInfo,
        error: TaskError,
    },
    /// Progress after a task settled (completed, failed or cancelled).
    Progress {
        batch: BatchId,
        snapshot: ProgressSnapshot,
    },
    /// The run reached a terminal state.
    BatchSettled {
        batch: BatchId,
        state: RunState,
        stats: BatchStats,
    },
}

/// Discriminant of a [`BatchEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TaskStarted,
    TaskFailed,
    Progress,
    BatchSettled,
}

impl BatchEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BatchEvent::TaskStarted { .. } => EventKind::TaskStarted,
            BatchEvent::TaskFailed { .. } => EventKind::TaskFailed,
            BatchEvent::Progress { .. } => EventKind::Progress,
            BatchEvent::BatchSettled { .. } => EventKind::BatchSettled,
        }
    }

    pub fn batch(&self) -> BatchId {
        match self {
            BatchEvent::TaskStarted { batch, .. }
            | BatchEvent::TaskFailed { batch, .. }
            | BatchEvent::Progress { batch, .. }
            | BatchEvent::BatchSettled { batch, .. } => *batch,
        }
    }
}

/// Listener for batch events.
///
/// Called synchronously on whichever thread settled the task, one event at a time and in
/// order. Implementations should be quick; a panic is caught and logged. Calling back into
/// the controller (e.g. `stop` from a progress handler) is allowed.
pub trait Subscribe: Send + Sync + 'static {
    fn on_event(&self, event: &BatchEvent);

    fn name(&self) -> &'static str {
        "subscriber"
    }
}
