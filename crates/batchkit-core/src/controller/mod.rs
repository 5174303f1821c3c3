//! Public orchestrator of a batch run.
//!
//! All bookkeeping (queue, slots, task table, progress) lives behind one mutex and is never
//! held across an await point. Dispatch happens greedily inside that lock: right after
//! `start`, after every settlement and after every late `add_task`, as many queued tasks are
//! dispatched as there are free slots. Events produced under the lock are delivered after it
//! is released, in order.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant, SystemTime},
};

use batchkit_model::{
    BatchId, BatchStats, ProgressSnapshot, RunState, TaskError, TaskId, TaskInfo, TaskOptions,
    TaskPage, TaskQuery, TaskStatus,
};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::{
    config::BatchConfig,
    error::CoreError,
    events::{BatchEvent, Bus, Callbacks, Subscribe},
    processor::ProcessorRef,
    progress::ProgressAggregator,
    queue::TaskQueue,
    slots::Slots,
    state::TaskState,
    task::{TaskRecord, TaskSnapshot},
    worker::{self, Job},
};

/// Runs one batch of tasks under a concurrency limit.
///
/// Two-phase API: enqueue with [`add_task`](Self::add_task), then [`start`](Self::start).
/// The controller is a cheap handle; clones share the same run.
pub struct BatchController<I, O> {
    shared: Arc<Shared<I, O>>,
}

impl<I, O> Clone for BatchController<I, O> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<I, O> {
    id: BatchId,
    config: BatchConfig,
    cancel: CancellationToken,
    bus: Bus,
    run: Mutex<Run<I, O>>,
}

struct Run<I, O> {
    state: RunState,
    stopped: bool,
    tasks: TaskState<I, O>,
    queue: TaskQueue,
    slots: Slots,
    progress: ProgressAggregator,
    next_seq: u64,
    started_at: Option<Instant>,
    ended_at: Option<Instant>,
    final_stats: Option<BatchStats>,
    runtime: Option<Handle>,
}

impl<I, O> BatchController<I, O>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    /// Create a controller for a fresh run.
    ///
    /// Fails with [`CoreError::InvalidConfig`] if `max_concurrency` is zero.
    pub fn new(
        config: BatchConfig,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let id = BatchId::new();
        let run = Run {
            state: RunState::Idle,
            stopped: false,
            tasks: TaskState::new(),
            queue: TaskQueue::new(),
            slots: Slots::new(config.max_concurrency),
            progress: ProgressAggregator::new(id),
            next_seq: 1,
            started_at: None,
            ended_at: None,
            final_stats: None,
            runtime: None,
        };

        debug!(batch = %id, max_concurrency = config.max_concurrency, "batch controller created");
        Ok(Self {
            shared: Arc::new(Shared {
                id,
                config,
                cancel: CancellationToken::new(),
                bus: Bus::new(subscribers),
                run: Mutex::new(run),
            }),
        })
    }

    /// Shorthand for a controller observed only through [`Callbacks`].
    pub fn with_callbacks(config: BatchConfig, callbacks: Callbacks) -> Result<Self, CoreError> {
        Self::new(config, vec![Arc::new(callbacks) as Arc<dyn Subscribe>])
    }

    /// Enqueue a task and return its id.
    ///
    /// Allowed before `start` and, while the run is still going, after it (the task joins the
    /// tail of the queue). Rejected once `stop` was called or the run is over.
    #[instrument(level = "trace", skip_all, fields(batch = %self.shared.id))]
    pub fn add_task(
        &self,
        input: Arc<I>,
        processor: ProcessorRef<I, O>,
        options: TaskOptions,
    ) -> Result<TaskId, CoreError> {
        let mut run = self.lock();

        if run.stopped {
            return Err(CoreError::Stopped { op: "add_task" });
        }
        match run.state {
            RunState::Idle => {}
            RunState::Running => {
                warn!(batch = %self.shared.id, "task added after start; it joins the tail of the queue")
            }
            state => return Err(CoreError::InvalidState { op: "add_task", state }),
        }

        let id = TaskId::new(run.next_seq);
        run.next_seq += 1;
        run.tasks
            .insert(TaskRecord::new(id, input, processor, options));
        run.queue.enqueue(id);
        run.progress.register();
        trace!(task = %id, queued = run.queue.len(), "task enqueued");

        if run.state == RunState::Running {
            run.pump(&self.shared);
        }
        drop(run);
        self.shared.bus.flush();

        Ok(id)
    }

    /// Begin dispatching. A run executes at most once.
    ///
    /// Must be called from within a tokio runtime; processing functions are spawned on it.
    #[instrument(level = "debug", skip_all, fields(batch = %self.shared.id))]
    pub fn start(&self) -> Result<(), CoreError> {
        let mut run = self.lock();

        if run.state != RunState::Idle {
            return Err(CoreError::InvalidState {
                op: "start",
                state: run.state,
            });
        }
        let handle = Handle::try_current().map_err(|_| CoreError::NoRuntime)?;

        run.state = RunState::Running;
        run.started_at = Some(Instant::now());
        run.runtime = Some(handle);
        info!(
            batch = %self.shared.id,
            tasks = run.tasks.len(),
            max_concurrency = run.slots.max(),
            "batch started"
        );

        run.pump(&self.shared);
        run.finalize_if_settled(&self.shared);
        drop(run);
        self.shared.bus.flush();

        Ok(())
    }

    /// Stop dispatching: queued tasks are cancelled, running tasks finish on their own.
    ///
    /// The cancellation token handed to processors is cancelled so they may cooperate. The run
    /// finalizes as [`RunState::Stopped`] once the last running task settles. Stopping an
    /// idle run cancels everything and finalizes immediately. Calling `stop` again while the
    /// run drains is a no-op.
    #[instrument(level = "debug", skip_all, fields(batch = %self.shared.id))]
    pub fn stop(&self) -> Result<(), CoreError> {
        let mut run = self.lock();

        if run.state.is_terminal() {
            return Err(CoreError::InvalidState {
                op: "stop",
                state: run.state,
            });
        }
        if run.stopped {
            return Ok(());
        }

        run.stopped = true;
        self.shared.cancel.cancel();
        if run.state == RunState::Idle {
            run.state = RunState::Running;
            run.started_at = Some(Instant::now());
        }

        let now = SystemTime::now();
        let mut events = Vec::new();
        let pending = run.queue.close();
        for id in &pending {
            let Some(info) = run.tasks.get_mut(*id).and_then(|t| t.cancel(now).then(|| t.info()))
            else {
                continue;
            };
            run.progress.on_task_settled(&info, &mut events);
        }
        self.shared.bus.publish_all(events);

        info!(
            batch = %self.shared.id,
            cancelled = pending.len(),
            running = run.slots.active(),
            "batch stop requested"
        );

        run.finalize_if_settled(&self.shared);
        drop(run);
        self.shared.bus.flush();

        Ok(())
    }

    /// Wait until the run is terminal and every event has been delivered.
    ///
    /// Never resolves for a run that is not started (or stopped).
    pub async fn wait(&self) -> BatchStats {
        let mut rx = self.shared.bus.settled();
        loop {
            if let Some(stats) = rx.borrow_and_update().clone() {
                return stats;
            }
            if rx.changed().await.is_err() {
                return self.stats();
            }
        }
    }

    /// Current statistics; final once the run is terminal.
    pub fn stats(&self) -> BatchStats {
        let run = self.lock();
        if let Some(stats) = &run.final_stats {
            return stats.clone();
        }
        run.progress.stats(run.elapsed())
    }

    /// Current progress snapshot.
    pub fn progress(&self) -> ProgressSnapshot {
        self.lock().progress.snapshot()
    }

    /// Completed tasks in enqueue order (not completion order).
    pub fn completed_tasks(&self) -> Vec<TaskSnapshot<I, O>> {
        self.lock().tasks.completed()
    }

    /// Completed tasks in enqueue order; the run's task table is released afterwards.
    ///
    /// Only available once the run is terminal.
    pub fn take_completed_tasks(&self) -> Result<Vec<TaskSnapshot<I, O>>, CoreError> {
        let mut run = self.lock();
        if !run.state.is_terminal() {
            return Err(CoreError::InvalidState {
                op: "take_completed_tasks",
                state: run.state,
            });
        }
        Ok(run.tasks.take_completed())
    }

    pub fn task(&self, id: TaskId) -> Option<TaskInfo> {
        self.lock().tasks.get(id).map(TaskRecord::info)
    }

    /// Tasks currently in `status`, in enqueue order.
    pub fn tasks_with_status(&self, status: TaskStatus) -> Vec<TaskInfo> {
        self.lock().tasks.list_by_status(status)
    }

    /// Query tasks by status with pagination.
    pub fn tasks(&self, query: &TaskQuery) -> TaskPage<TaskInfo> {
        self.lock().tasks.query(query)
    }

    pub fn state(&self) -> RunState {
        self.lock().state
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    pub fn id(&self) -> BatchId {
        self.shared.id
    }

    pub fn config(&self) -> &BatchConfig {
        &self.shared.config
    }

    /// Number of tasks currently running.
    pub fn active_count(&self) -> usize {
        self.lock().slots.active()
    }

    /// Highest number of simultaneously running tasks observed so far.
    pub fn peak_concurrency(&self) -> usize {
        self.lock().slots.peak()
    }

    fn lock(&self) -> MutexGuard<'_, Run<I, O>> {
        self.shared.lock()
    }
}

impl<I, O> Shared<I, O>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, Run<I, O>> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a worker's outcome, free its slot and keep the pool saturated.
    fn settle(self: &Arc<Self>, id: TaskId, outcome: Result<O, TaskError>) {
        let mut run = self.lock();
        run.settle(self, id, outcome);
        drop(run);
        self.bus.flush();
    }
}

impl<I, O> Run<I, O>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    /// Dispatch queued tasks until the queue is empty or every slot is taken.
    fn pump(&mut self, shared: &Arc<Shared<I, O>>) {
        let Some(runtime) = self.runtime.clone() else {
            return;
        };

        while !self.stopped && !self.queue.is_empty() {
            if !self.slots.try_acquire() {
                break;
            }
            let Some(id) = self.queue.dequeue() else {
                self.slots.release();
                break;
            };
            let Some(task) = self.tasks.get_mut(id) else {
                self.slots.release();
                continue;
            };
            if !task.start(SystemTime::now()) {
                self.slots.release();
                continue;
            }
            let Some(processor) = task.processor.take() else {
                warn!(task = %id, "dispatched task has no processor");
                self.slots.release();
                let now = SystemTime::now();
                if task.fail(TaskError::fail("processor already released"), now) {
                    let info = task.info();
                    let mut events = Vec::new();
                    self.progress.on_task_settled(&info, &mut events);
                    shared.bus.publish_all(events);
                }
                continue;
            };

            let job = Job {
                id,
                input: Arc::clone(&task.input),
                processor,
                options: task.options.clone(),
                timeout: shared.config.task_timeout,
                ctx: shared.cancel.child_token(),
            };
            shared.bus.publish(BatchEvent::TaskStarted {
                batch: shared.id,
                task: task.info(),
            });
            trace!(
                task = %id,
                active = self.slots.active(),
                available = self.slots.available(),
                "task dispatched"
            );

            let shared = Arc::clone(shared);
            runtime.spawn(async move {
                let outcome = worker::execute(job).await;
                shared.settle(id, outcome);
            });
        }
    }

    fn settle(&mut self, shared: &Arc<Shared<I, O>>, id: TaskId, outcome: Result<O, TaskError>) {
        let now = SystemTime::now();
        let Some(task) = self.tasks.get_mut(id) else {
            warn!(task = %id, "settled task is missing from the task table");
            self.slots.release();
            return;
        };

        let recorded = match outcome {
            Ok(result) => {
                debug!(task = %id, "task completed");
                task.complete(result, now)
            }
            Err(error) => {
                warn!(task = %id, kind = error.kind(), %error, "task failed");
                task.fail(error, now)
            }
        };
        let info = task.info();
        self.slots.release();

        if recorded {
            let mut events = Vec::new();
            self.progress.on_task_settled(&info, &mut events);
            shared.bus.publish_all(events);
        }

        self.pump(shared);
        self.finalize_if_settled(shared);
    }

    /// Move to a terminal state once nothing is queued or running.
    fn finalize_if_settled(&mut self, shared: &Arc<Shared<I, O>>) {
        if self.state != RunState::Running || self.slots.active() > 0 || !self.queue.is_empty() {
            return;
        }

        self.state = if self.stopped {
            RunState::Stopped
        } else {
            RunState::Completed
        };
        self.ended_at = Some(Instant::now());
        self.queue.close();

        let elapsed = self.elapsed();
        let mut events = Vec::new();
        let stats = self
            .progress
            .on_batch_settled(self.state, elapsed, &mut events);
        shared.bus.publish_all(events);

        info!(
            batch = %shared.id,
            state = %self.state,
            total = stats.total_tasks,
            completed = stats.completed_tasks,
            failed = stats.failed_tasks,
            cancelled = stats.cancelled_tasks,
            duration_ms = stats.duration.as_millis() as u64,
            "batch settled"
        );
        self.final_stats = Some(stats);
    }

    fn elapsed(&self) -> Duration {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Notify;

    use super::*;
    use crate::processor::ProcessorFn;

    fn controller(max: usize) -> BatchController<u32, u32> {
        BatchController::new(BatchConfig::new(max), Vec::new()).unwrap()
    }

    fn double() -> ProcessorRef<u32, u32> {
        ProcessorFn::arc("double", |i: Arc<u32>, _opts, _ctx| async move { Ok(*i * 2) })
    }

    #[test]
    fn zero_concurrency_is_rejected_at_construction() {
        let res = BatchController::<u32, u32>::new(BatchConfig::new(0), Vec::new());
        assert!(matches!(res, Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn ids_follow_enqueue_order() {
        let c = controller(2);
        let a = c.add_task(Arc::new(1), double(), TaskOptions::new()).unwrap();
        let b = c.add_task(Arc::new(2), double(), TaskOptions::new()).unwrap();
        assert!(a < b);
        assert_eq!(c.task(a).unwrap().status, TaskStatus::Queued);
        assert_eq!(c.state(), RunState::Idle);
    }

    #[test]
    fn start_outside_runtime_fails() {
        let c = controller(1);
        assert_eq!(c.start(), Err(CoreError::NoRuntime));
        assert_eq!(c.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn completed_tasks_keep_enqueue_order() {
        let c = controller(3);
        for n in [5u32, 1, 3, 2] {
            let delay = Duration::from_millis(u64::from(n) * 5);
            let p: ProcessorRef<u32, u32> =
                ProcessorFn::arc("sleepy", move |i: Arc<u32>, _opts, _ctx| async move {
                    tokio::time::sleep(delay).await;
                    Ok(*i)
                });
            c.add_task(Arc::new(n), p, TaskOptions::new()).unwrap();
        }

        c.start().unwrap();
        let stats = c.wait().await;

        assert_eq!(stats.completed_tasks, 4);
        let inputs: Vec<u32> = c.completed_tasks().iter().map(|t| *t.input).collect();
        assert_eq!(inputs, vec![5, 1, 3, 2]);
    }

    #[tokio::test]
    async fn late_task_joins_running_batch() {
        let c = controller(1);
        let gate = Arc::new(Notify::new());

        let g = Arc::clone(&gate);
        let blocked: ProcessorRef<u32, u32> =
            ProcessorFn::arc("blocked", move |i: Arc<u32>, _opts, _ctx| {
                let g = Arc::clone(&g);
                async move {
                    g.notified().await;
                    Ok(*i)
                }
            });

        c.add_task(Arc::new(1), blocked, TaskOptions::new()).unwrap();
        c.start().unwrap();
        let late = c.add_task(Arc::new(2), double(), TaskOptions::new()).unwrap();
        assert_eq!(c.task(late).unwrap().status, TaskStatus::Queued);

        gate.notify_one();
        let stats = c.wait().await;

        assert_eq!(stats.total_tasks, 2);
        assert_eq!(stats.completed_tasks, 2);
        assert_eq!(c.task(late).unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn add_after_stop_is_rejected() {
        let c = controller(1);
        c.add_task(Arc::new(1), double(), TaskOptions::new()).unwrap();
        c.stop().unwrap();

        let err = c.add_task(Arc::new(2), double(), TaskOptions::new());
        assert_eq!(err, Err(CoreError::Stopped { op: "add_task" }));
    }

    #[tokio::test]
    async fn add_after_completion_is_rejected() {
        let c = controller(2);
        c.add_task(Arc::new(1), double(), TaskOptions::new()).unwrap();
        c.start().unwrap();
        c.wait().await;
        assert_eq!(c.state(), RunState::Completed);

        let err = c.add_task(Arc::new(2), double(), TaskOptions::new());
        assert_eq!(
            err,
            Err(CoreError::InvalidState {
                op: "add_task",
                state: RunState::Completed
            })
        );
        assert_eq!(c.stats().total_tasks, 1);
        assert_eq!(c.progress().total_tasks, 1);
    }

    #[tokio::test]
    async fn settled_tasks_release_their_processor() {
        let c = controller(1);
        let p = double();
        for n in 0..3 {
            c.add_task(Arc::new(n), Arc::clone(&p), TaskOptions::new()).unwrap();
        }
        assert_eq!(Arc::strong_count(&p), 4);

        c.start().unwrap();
        c.wait().await;

        assert_eq!(c.completed_tasks().len(), 3);
        assert_eq!(Arc::strong_count(&p), 1);
    }

    #[tokio::test]
    async fn stop_on_idle_run_cancels_everything() {
        let c = controller(2);
        for n in 0..3 {
            c.add_task(Arc::new(n), double(), TaskOptions::new()).unwrap();
        }

        c.stop().unwrap();
        assert_eq!(c.state(), RunState::Stopped);

        let stats = c.wait().await;
        assert_eq!(stats.cancelled_tasks, 3);
        assert_eq!(stats.completed_tasks, 0);
        assert_eq!(
            c.start(),
            Err(CoreError::InvalidState {
                op: "start",
                state: RunState::Stopped
            })
        );
        assert_eq!(
            c.stop(),
            Err(CoreError::InvalidState {
                op: "stop",
                state: RunState::Stopped
            })
        );
    }

    #[tokio::test]
    async fn take_completed_requires_terminal_run_and_releases_tasks() {
        let c = controller(2);
        c.add_task(Arc::new(4), double(), TaskOptions::new()).unwrap();
        assert!(c.take_completed_tasks().is_err());

        c.start().unwrap();
        c.wait().await;

        let done = c.take_completed_tasks().unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].result.as_deref(), Some(&8));
        assert!(c.completed_tasks().is_empty());
        assert_eq!(c.stats().completed_tasks, 1);
    }

    #[tokio::test]
    async fn processors_see_stop_through_token() {
        let c = controller(1);
        let observed = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(Notify::new());

        let (o, s) = (Arc::clone(&observed), Arc::clone(&started));
        let p: ProcessorRef<u32, u32> =
            ProcessorFn::arc("cooperative", move |i: Arc<u32>, _opts, ctx: CancellationToken| {
                let (o, s) = (Arc::clone(&o), Arc::clone(&s));
                async move {
                    s.notify_one();
                    ctx.cancelled().await;
                    o.fetch_add(1, Ordering::SeqCst);
                    Ok(*i)
                }
            });

        c.add_task(Arc::new(1), p, TaskOptions::new()).unwrap();
        c.start().unwrap();
        started.notified().await;
        c.stop().unwrap();

        let stats = c.wait().await;
        assert_eq!(observed.load(Ordering::SeqCst), 1);
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(c.state(), RunState::Stopped);
    }

    #[tokio::test]
    async fn query_reports_statuses() {
        let c = controller(2);
        let fail: ProcessorRef<u32, u32> = ProcessorFn::arc("fail", |_i: Arc<u32>, _opts, _ctx| async move {
            Err(TaskError::fail("corrupt header"))
        });
        c.add_task(Arc::new(1), double(), TaskOptions::new()).unwrap();
        let bad = c.add_task(Arc::new(2), fail, TaskOptions::new()).unwrap();

        c.start().unwrap();
        c.wait().await;

        let failed = c.tasks(&TaskQuery::new().with_status(TaskStatus::Failed));
        assert_eq!(failed.total, 1);
        assert_eq!(failed.items[0].id, bad);
        assert_eq!(
            failed.items[0].error,
            Some(TaskError::fail("corrupt header"))
        );
    }
}
