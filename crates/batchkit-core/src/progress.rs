//! Progress aggregation.
//!
//! Turns task settlements into [`ProgressSnapshot`]s and, once the run is over, into the final
//! [`BatchStats`]. `overall_progress` never goes backwards (late enqueues grow `total` but do
//! not lower the reported value) and stays below 100 until the run is terminal.

use std::time::Duration;

use batchkit_model::{
    BatchId, BatchStats, ProgressSnapshot, RunState, TaskInfo, TaskStatus,
};

use crate::events::BatchEvent;

#[derive(Debug)]
pub struct ProgressAggregator {
    batch: BatchId,
    total: usize,
    completed: usize,
    failed: usize,
    cancelled: usize,
    reported: u8,
}

impl ProgressAggregator {
    pub fn new(batch: BatchId) -> Self {
        Self {
            batch,
            total: 0,
            completed: 0,
            failed: 0,
            cancelled: 0,
            reported: 0,
        }
    }

    /// Account for a newly enqueued task.
    pub fn register(&mut self) {
        self.total += 1;
    }

    /// Record a settled task and append the resulting events to `out`.
    ///
    /// A failed task yields `TaskFailed` followed by `Progress`; any other settlement yields
    /// only `Progress`.
    pub fn on_task_settled(&mut self, task: &TaskInfo, out: &mut Vec<BatchEvent>) -> ProgressSnapshot {
        match task.status {
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::Cancelled => self.cancelled += 1,
            TaskStatus::Queued | TaskStatus::Running => return self.snapshot(),
        }

        if let (TaskStatus::Failed, Some(error)) = (task.status, &task.error) {
            out.push(BatchEvent::TaskFailed {
                batch: self.batch,
                task: task.clone(),
                error: error.clone(),
            });
        }

        let current = percent(self.settled(), self.total);
        self.reported = self.reported.max(current);

        let snapshot = self.snapshot();
        out.push(BatchEvent::Progress {
            batch: self.batch,
            snapshot,
        });
        snapshot
    }

    /// Close the run and append the final events to `out`.
    ///
    /// An empty run never saw a settlement, so it gets its single `Progress` at 100 here.
    pub fn on_batch_settled(
        &mut self,
        state: RunState,
        duration: Duration,
        out: &mut Vec<BatchEvent>,
    ) -> BatchStats {
        if self.reported < 100 {
            self.reported = 100;
            out.push(BatchEvent::Progress {
                batch: self.batch,
                snapshot: self.snapshot(),
            });
        }

        let stats = self.stats(duration);
        out.push(BatchEvent::BatchSettled {
            batch: self.batch,
            state,
            stats: stats.clone(),
        });
        stats
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            processed_tasks: self.settled(),
            total_tasks: self.total,
            overall_progress: self.reported,
        }
    }

    pub fn stats(&self, duration: Duration) -> BatchStats {
        BatchStats {
            total_tasks: self.total,
            completed_tasks: self.completed,
            failed_tasks: self.failed,
            cancelled_tasks: self.cancelled,
            success_rate: BatchStats::success_rate(self.completed, self.total),
            duration,
        }
    }

    /// Completed + failed + cancelled.
    pub fn settled(&self) -> usize {
        self.completed + self.failed + self.cancelled
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

/// Rounded percentage, capped at 99 while anything is still outstanding.
fn percent(settled: usize, total: usize) -> u8 {
    if total == 0 || settled >= total {
        return 100;
    }
    let raw = (settled as f64 / total as f64 * 100.0).round() as u8;
    raw.min(99)
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use batchkit_model::{TaskError, TaskId};

    use super::*;
    use crate::events::EventKind;

    fn settled(id: u64, status: TaskStatus) -> TaskInfo {
        TaskInfo {
            id: TaskId::new(id),
            status,
            enqueued_at: SystemTime::now(),
            started_at: None,
            settled_at: Some(SystemTime::now()),
            error: (status == TaskStatus::Failed).then(|| TaskError::fail("broken")),
        }
    }

    fn aggregator(total: usize) -> ProgressAggregator {
        let mut agg = ProgressAggregator::new(BatchId::new());
        for _ in 0..total {
            agg.register();
        }
        agg
    }

    #[test]
    fn percent_rounds_and_caps() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(199, 200), 99);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn failure_emits_error_before_progress() {
        let mut agg = aggregator(2);
        let mut out = Vec::new();

        agg.on_task_settled(&settled(1, TaskStatus::Failed), &mut out);

        let kinds: Vec<_> = out.iter().map(BatchEvent::kind).collect();
        assert_eq!(kinds, vec![EventKind::TaskFailed, EventKind::Progress]);
    }

    #[test]
    fn progress_reaches_100_when_all_settled() {
        let mut agg = aggregator(3);
        let mut out = Vec::new();

        assert_eq!(agg.on_task_settled(&settled(1, TaskStatus::Completed), &mut out).overall_progress, 33);
        assert_eq!(agg.on_task_settled(&settled(2, TaskStatus::Cancelled), &mut out).overall_progress, 67);
        let last = agg.on_task_settled(&settled(3, TaskStatus::Failed), &mut out);

        assert_eq!(last.overall_progress, 100);
        assert_eq!(last.processed_tasks, 3);
        let stats = agg.stats(Duration::ZERO);
        assert_eq!((stats.completed_tasks, stats.failed_tasks, stats.cancelled_tasks), (1, 1, 1));
    }

    #[test]
    fn late_enqueue_does_not_lower_progress() {
        let mut agg = aggregator(2);
        let mut out = Vec::new();

        agg.on_task_settled(&settled(1, TaskStatus::Completed), &mut out);
        assert_eq!(agg.snapshot().overall_progress, 50);

        agg.register();
        agg.register();
        let snap = agg.on_task_settled(&settled(2, TaskStatus::Completed), &mut out);

        assert_eq!(snap.overall_progress, 50);
        assert_eq!(snap.total_tasks, 4);
    }

    #[test]
    fn empty_run_settles_at_100() {
        let mut agg = aggregator(0);
        let mut out = Vec::new();

        let stats = agg.on_batch_settled(RunState::Completed, Duration::ZERO, &mut out);

        assert_eq!(stats.total_tasks, 0);
        assert_eq!(stats.success_rate, 100.0);
        assert_eq!(agg.snapshot().overall_progress, 100);
        let kinds: Vec<_> = out.iter().map(BatchEvent::kind).collect();
        assert_eq!(kinds, vec![EventKind::Progress, EventKind::BatchSettled]);
    }

    #[test]
    fn finished_run_emits_only_batch_settled() {
        let mut agg = aggregator(1);
        let mut out = Vec::new();
        agg.on_task_settled(&settled(1, TaskStatus::Completed), &mut out);
        out.clear();

        agg.on_batch_settled(RunState::Completed, Duration::ZERO, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind(), EventKind::BatchSettled);
    }
}
