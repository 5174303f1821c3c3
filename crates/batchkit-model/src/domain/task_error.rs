use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::TimeoutMs;

/// Failure of a single task.
///
/// Task failures are always isolated: they are recorded on the task and reported to
/// subscribers, never propagated into the scheduler's own control flow.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TaskError {
    #[error("task failed: {reason}")]
    Failed { reason: String },
    #[error("task exceeded its timeout of {timeout_ms}ms")]
    Timeout { timeout_ms: TimeoutMs },
    #[error("task panicked: {reason}")]
    Panicked { reason: String },
    #[error("task canceled")]
    Canceled,
}

impl TaskError {
    /// Shorthand for [`TaskError::Failed`].
    pub fn fail(reason: impl std::fmt::Display) -> Self {
        TaskError::Failed {
            reason: reason.to_string(),
        }
    }

    /// Short symbolic name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::Failed { .. } => "failed",
            TaskError::Timeout { .. } => "timeout",
            TaskError::Panicked { .. } => "panicked",
            TaskError::Canceled => "canceled",
        }
    }
}

impl From<std::io::Error> for TaskError {
    fn from(e: std::io::Error) -> Self {
        TaskError::fail(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_reason() {
        let err = TaskError::fail("unsupported pixel format");
        assert_eq!(err.to_string(), "task failed: unsupported pixel format");
        assert_eq!(err.kind(), "failed");
    }

    #[test]
    fn io_errors_become_failures() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.png");
        let err: TaskError = io.into();
        assert!(matches!(err, TaskError::Failed { ref reason } if reason.contains("missing.png")));
    }

    #[test]
    fn serde_is_tagged() {
        let json = serde_json::to_string(&TaskError::Timeout { timeout_ms: 500 }).unwrap();
        assert_eq!(json, r#"{"kind":"timeout","timeoutMs":500}"#);

        let back: TaskError = serde_json::from_str(r#"{"kind":"panicked","reason":"overflow"}"#).unwrap();
        assert_eq!(
            back,
            TaskError::Panicked {
                reason: "overflow".into()
            }
        );
    }
}
