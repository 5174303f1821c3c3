use std::time::Duration;

use crate::error::CoreError;

/// Settings of one batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Upper bound on simultaneously running tasks; must be positive.
    pub max_concurrency: usize,
    /// Optional limit on a single processing call.
    ///
    /// `None` (default) leaves timeouts to the processing function. A task that never
    /// settles then holds its slot forever and the run never finalizes.
    pub task_timeout: Option<Duration>,
}

impl BatchConfig {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency,
            task_timeout: None,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_concurrency == 0 {
            return Err(CoreError::InvalidConfig(
                "max_concurrency must be a positive integer".to_string(),
            ));
        }
        if self.task_timeout.is_some_and(|t| t.is_zero()) {
            return Err(CoreError::InvalidConfig(
                "task_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::new(4)
    }
}
