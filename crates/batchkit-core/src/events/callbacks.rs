use batchkit_model::{BatchStats, ProgressSnapshot, TaskError, TaskInfo};

use crate::events::{BatchEvent, Subscribe};

type ProgressFn = Box<dyn Fn(&ProgressSnapshot) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&TaskInfo, &TaskError) + Send + Sync>;
type SuccessFn = Box<dyn Fn(&BatchStats) + Send + Sync>;

/// Closure-based subscriber with the three classic hooks.
///
/// ```
/// use batchkit_core::Callbacks;
///
/// let cb = Callbacks::new()
///     .on_progress(|p| println!("{}%", p.overall_progress))
///     .on_error(|task, err| eprintln!("{}: {err}", task.id))
///     .on_success(|stats| println!("done: {}/{}", stats.completed_tasks, stats.total_tasks));
/// # let _ = cb;
/// ```
#[derive(Default)]
pub struct Callbacks {
    progress: Option<ProgressFn>,
    error: Option<ErrorFn>,
    success: Option<SuccessFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoked after every task settlement.
    pub fn on_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(&ProgressSnapshot) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(f));
        self
    }

    /// Invoked when a task fails, before the matching progress update.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&TaskInfo, &TaskError) + Send + Sync + 'static,
    {
        self.error = Some(Box::new(f));
        self
    }

    /// Invoked once with the final statistics, whether the run completed or was stopped.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&BatchStats) + Send + Sync + 'static,
    {
        self.success = Some(Box::new(f));
        self
    }
}

impl Subscribe for Callbacks {
    fn on_event(&self, event: &BatchEvent) {
        match event {
            BatchEvent::Progress { snapshot, .. } => {
                if let Some(f) = &self.progress {
                    f(snapshot);
                }
            }
            BatchEvent::TaskFailed { task, error, .. } => {
                if let Some(f) = &self.error {
                    f(task, error);
                }
            }
            BatchEvent::BatchSettled { stats, .. } => {
                if let Some(f) = &self.success {
                    f(stats);
                }
            }
            BatchEvent::TaskStarted { .. } => {}
        }
    }

    fn name(&self) -> &'static str {
        "callbacks"
    }
}
