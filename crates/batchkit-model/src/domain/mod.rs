mod kv;
pub use kv::KeyValue;

mod task_options;
pub use task_options::TaskOptions;

mod task_id;
pub use task_id::{BatchId, TaskId};

mod task_status;
pub use task_status::TaskStatus;

mod run_state;
pub use run_state::RunState;

mod task_error;
pub use task_error::TaskError;

mod task_info;
pub use task_info::TaskInfo;

mod task_query;
pub use task_query::{TaskPage, TaskQuery};

mod progress;
pub use progress::ProgressSnapshot;

mod batch_stats;
pub use batch_stats::BatchStats;

/// Timeout value in milliseconds.
///
/// Used by the optional per-task timeout and reported back in [`TaskError::Timeout`].
pub type TimeoutMs = u64;
