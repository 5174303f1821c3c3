use std::{fmt, sync::Arc, time::SystemTime};

use batchkit_model::{TaskError, TaskId, TaskInfo, TaskOptions, TaskStatus};
use tracing::error;

use crate::processor::ProcessorRef;

/// A task as stored in the run's task table.
pub(crate) struct TaskRecord<I, O> {
    pub id: TaskId,
    pub input: Arc<I>,
    /// Handed to the worker on dispatch; dropped once the task can no longer run.
    pub processor: Option<ProcessorRef<I, O>>,
    pub options: TaskOptions,
    pub status: TaskStatus,
    pub result: Option<Arc<O>>,
    pub error: Option<TaskError>,
    pub enqueued_at: SystemTime,
    pub started_at: Option<SystemTime>,
    pub settled_at: Option<SystemTime>,
}

impl<I, O> TaskRecord<I, O> {
    pub fn new(
        id: TaskId,
        input: Arc<I>,
        processor: ProcessorRef<I, O>,
        options: TaskOptions,
    ) -> Self {
        Self {
            id,
            input,
            processor: Some(processor),
            options,
            status: TaskStatus::Queued,
            result: None,
            error: None,
            enqueued_at: SystemTime::now(),
            started_at: None,
            settled_at: None,
        }
    }

    /// Move to `next`, refusing anything outside the task state machine.
    fn advance(&mut self, next: TaskStatus) -> bool {
        if !self.status.can_transition_to(next) {
            error!(task = %self.id, from = ?self.status, to = ?next, "illegal task transition ignored");
            return false;
        }
        self.status = next;
        true
    }

    pub fn start(&mut self, now: SystemTime) -> bool {
        let ok = self.advance(TaskStatus::Running);
        if ok {
            self.started_at = Some(now);
        }
        ok
    }

    pub fn complete(&mut self, result: O, now: SystemTime) -> bool {
        let ok = self.advance(TaskStatus::Completed);
        if ok {
            self.result = Some(Arc::new(result));
            self.settled_at = Some(now);
        }
        ok
    }

    pub fn fail(&mut self, err: TaskError, now: SystemTime) -> bool {
        let ok = self.advance(TaskStatus::Failed);
        if ok {
            self.error = Some(err);
            self.settled_at = Some(now);
        }
        ok
    }

    pub fn cancel(&mut self, now: SystemTime) -> bool {
        let ok = self.advance(TaskStatus::Cancelled);
        if ok {
            self.processor = None;
            self.settled_at = Some(now);
        }
        ok
    }

    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            id: self.id,
            status: self.status,
            enqueued_at: self.enqueued_at,
            started_at: self.started_at,
            settled_at: self.settled_at,
            error: self.error.clone(),
        }
    }

    pub fn snapshot(&self) -> TaskSnapshot<I, O> {
        TaskSnapshot {
            id: self.id,
            input: Arc::clone(&self.input),
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
            enqueued_at: self.enqueued_at,
            started_at: self.started_at,
            settled_at: self.settled_at,
        }
    }
}

/// Caller-facing copy of a task, including its typed input and result.
pub struct TaskSnapshot<I, O> {
    pub id: TaskId,
    pub input: Arc<I>,
    pub status: TaskStatus,
    /// Present only when `status` is `Completed`.
    pub result: Option<Arc<O>>,
    /// Present only when `status` is `Failed`.
    pub error: Option<TaskError>,
    pub enqueued_at: SystemTime,
    pub started_at: Option<SystemTime>,
    pub settled_at: Option<SystemTime>,
}

impl<I, O> Clone for TaskSnapshot<I, O> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            input: Arc::clone(&self.input),
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
            enqueued_at: self.enqueued_at,
            started_at: self.started_at,
            settled_at: self.settled_at,
        }
    }
}

impl<I: fmt::Debug, O: fmt::Debug> fmt::Debug for TaskSnapshot<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSnapshot")
            .field("id", &self.id)
            .field("input", &self.input)
            .field("status", &self.status)
            .field("result", &self.result)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::ProcessorFn;

    fn record(id: u64) -> TaskRecord<u32, u32> {
        let p: ProcessorRef<u32, u32> =
            ProcessorFn::arc("noop", |i: Arc<u32>, _opts, _ctx| async move { Ok(*i) });
        TaskRecord::new(TaskId::new(id), Arc::new(id as u32), p, TaskOptions::new())
    }

    #[test]
    fn completed_path_sets_result_and_timestamps() {
        let mut t = record(1);
        let now = SystemTime::now();

        assert!(t.start(now));
        assert!(t.complete(42, now));

        assert_eq!(t.status, TaskStatus::Completed);
        assert_eq!(t.result.as_deref(), Some(&42));
        assert!(t.error.is_none());
        assert!(t.started_at.is_some() && t.settled_at.is_some());
    }

    #[test]
    fn failed_path_sets_error_only() {
        let mut t = record(2);
        let now = SystemTime::now();

        t.start(now);
        assert!(t.fail(TaskError::fail("corrupt"), now));

        let info = t.info();
        assert_eq!(info.status, TaskStatus::Failed);
        assert_eq!(info.error, Some(TaskError::fail("corrupt")));
        assert!(t.result.is_none());
    }

    #[test]
    fn running_task_cannot_be_cancelled() {
        let mut t = record(3);
        let now = SystemTime::now();

        t.start(now);
        assert!(!t.cancel(now));
        assert_eq!(t.status, TaskStatus::Running);
    }

    #[test]
    fn queued_task_cannot_complete_directly() {
        let mut t = record(4);
        assert!(!t.complete(1, SystemTime::now()));
        assert_eq!(t.status, TaskStatus::Queued);
        assert!(t.result.is_none());
    }

    #[test]
    fn cancelled_task_never_starts() {
        let mut t = record(5);
        let now = SystemTime::now();

        assert!(t.cancel(now));
        assert!(!t.start(now));
        assert!(t.started_at.is_none());
    }

    #[test]
    fn cancel_releases_processor() {
        let mut t = record(6);
        assert!(t.processor.is_some());

        t.cancel(SystemTime::now());
        assert!(t.processor.is_none());
    }
}
