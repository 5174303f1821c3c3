use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Statistics of a run, either in progress or final.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub cancelled_tasks: usize,
    /// `completed / total * 100`, `100` for an empty run.
    pub success_rate: f64,
    /// Wall time between start and the terminal state (or now, while running).
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl BatchStats {
    /// Success rate in percent; an empty run counts as fully successful.
    pub fn success_rate(completed: usize, total: usize) -> f64 {
        if total == 0 {
            return 100.0;
        }
        completed as f64 / total as f64 * 100.0
    }

    /// Tasks that reached a terminal state.
    pub fn settled_tasks(&self) -> usize {
        self.completed_tasks + self.failed_tasks + self.cancelled_tasks
    }

    /// `true` once every submitted task is accounted for.
    pub fn is_balanced(&self) -> bool {
        self.settled_tasks() == self.total_tasks
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (d.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_run_is_fully_successful() {
        assert_eq!(BatchStats::success_rate(0, 0), 100.0);
    }

    #[test]
    fn success_rate_is_percentage() {
        assert_eq!(BatchStats::success_rate(4, 5), 80.0);
        assert_eq!(BatchStats::success_rate(0, 3), 0.0);
    }

    #[test]
    fn balanced_when_all_settled() {
        let stats = BatchStats {
            total_tasks: 5,
            completed_tasks: 2,
            failed_tasks: 0,
            cancelled_tasks: 3,
            success_rate: 40.0,
            duration: Duration::from_millis(12),
        };
        assert!(stats.is_balanced());
        assert_eq!(stats.settled_tasks(), 5);
    }

    #[test]
    fn duration_serialized_as_millis() {
        let stats = BatchStats {
            total_tasks: 0,
            completed_tasks: 0,
            failed_tasks: 0,
            cancelled_tasks: 0,
            success_rate: 100.0,
            duration: Duration::from_millis(1500),
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["duration"], 1500);
        assert_eq!(json["successRate"], 100.0);
    }
}
