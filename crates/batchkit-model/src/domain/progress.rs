use serde::{Deserialize, Serialize};

/// Aggregated progress of a run, emitted after every task settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Completed + failed + cancelled tasks.
    pub processed_tasks: usize,
    /// Tasks submitted to the run so far.
    pub total_tasks: usize,
    /// Percentage in `0..=100`, non-decreasing over the run.
    pub overall_progress: u8,
}

impl ProgressSnapshot {
    pub fn is_complete(&self) -> bool {
        self.overall_progress == 100
    }
}
