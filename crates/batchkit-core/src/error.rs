use batchkit_model::RunState;
use thiserror::Error;

/// Errors surfaced synchronously to the caller of a [`crate::BatchController`].
///
/// Task failures never show up here; they are recorded on the task itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("`{op}` is not allowed while the run is {state}")]
    InvalidState { op: &'static str, state: RunState },
    #[error("`{op}` rejected: the run has been stopped")]
    Stopped { op: &'static str },
    #[error("no tokio runtime available to dispatch tasks")]
    NoRuntime,
}
