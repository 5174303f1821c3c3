use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::{TaskError, TaskId, TaskStatus};

/// Input-independent view of a task.
///
/// Carried by events and returned by task queries; the typed input and result live in the
/// scheduler's task table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    /// Task identifier, unique within its batch.
    pub id: TaskId,
    /// Current execution state.
    pub status: TaskStatus,
    /// When the task was enqueued.
    #[serde(with = "time_serde")]
    pub enqueued_at: SystemTime,
    /// When the task was dispatched.
    #[serde(default, with = "opt_time_serde", skip_serializing_if = "Option::is_none")]
    pub started_at: Option<SystemTime>,
    /// When the task reached a terminal state.
    #[serde(default, with = "opt_time_serde", skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<SystemTime>,
    /// Failure (only when status is Failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

mod time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        (since_epoch.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }
}

mod opt_time_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(t) => super::time_serde::serialize(t, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(|ms| UNIX_EPOCH + Duration::from_millis(ms)))
    }
}
