use std::borrow::Borrow;

use batchkit_core::{BatchEvent, EventKind};
use batchkit_model::{RunState, TaskId};
use tracing::{debug, error, info, trace, warn};

/// Flat accessors over a [`BatchEvent`] for log fields.
pub trait View {
    fn kind(&self) -> EventKind;
    fn task(&self) -> Option<TaskId>;
    fn reason(&self) -> String;
    fn error_kind(&self) -> &'static str;
    fn percent(&self) -> u8;
}

impl<T> View for T
where
    T: Borrow<BatchEvent>,
{
    #[inline]
    fn kind(&self) -> EventKind {
        event(self).kind()
    }
    #[inline]
    fn task(&self) -> Option<TaskId> {
        match event(self) {
            BatchEvent::TaskStarted { task, .. } | BatchEvent::TaskFailed { task, .. } => {
                Some(task.id)
            }
            _ => None,
        }
    }
    #[inline]
    fn reason(&self) -> String {
        match event(self) {
            BatchEvent::TaskFailed { error, .. } => error.to_string(),
            _ => "unknown".to_string(),
        }
    }
    #[inline]
    fn error_kind(&self) -> &'static str {
        match event(self) {
            BatchEvent::TaskFailed { error, .. } => error.kind(),
            _ => "none",
        }
    }
    #[inline]
    fn percent(&self) -> u8 {
        match event(self) {
            BatchEvent::Progress { snapshot, .. } => snapshot.overall_progress,
            BatchEvent::BatchSettled { .. } => 100,
            _ => 0,
        }
    }
}

#[inline]
fn event<T: Borrow<BatchEvent>>(t: &T) -> &BatchEvent {
    <T as Borrow<BatchEvent>>::borrow(t)
}

#[inline]
pub fn message_for(kind: EventKind) -> &'static str {
    match kind {
        EventKind::TaskStarted => "task started (slot acquired)",
        EventKind::TaskFailed => "task failed (siblings unaffected)",
        EventKind::Progress => "batch progress",
        EventKind::BatchSettled => "batch settled",
    }
}

#[inline]
pub fn log_event<E: Borrow<BatchEvent>>(e: E) {
    let e = event(&e);
    let msg = message_for(e.kind());
    let batch = e.batch();

    match e {
        BatchEvent::TaskStarted { task, .. } => {
            debug!(%batch, task = %task.id, "{msg}")
        }
        BatchEvent::TaskFailed { task, .. } => error!(
            %batch,
            task = %task.id,
            kind = e.error_kind(),
            reason = %e.reason(),
            "{msg}"
        ),
        BatchEvent::Progress { snapshot, .. } => trace!(
            %batch,
            processed = snapshot.processed_tasks,
            total = snapshot.total_tasks,
            percent = e.percent(),
            "{msg}"
        ),
        BatchEvent::BatchSettled { state, stats, .. } => {
            let clean = *state == RunState::Completed && stats.failed_tasks == 0;
            if clean {
                info!(
                    %batch,
                    %state,
                    total = stats.total_tasks,
                    duration_ms = stats.duration.as_millis() as u64,
                    "{msg}"
                );
            } else {
                warn!(
                    %batch,
                    %state,
                    total = stats.total_tasks,
                    completed = stats.completed_tasks,
                    failed = stats.failed_tasks,
                    cancelled = stats.cancelled_tasks,
                    success_rate = stats.success_rate,
                    "{msg}"
                );
            }
        }
    }
}
