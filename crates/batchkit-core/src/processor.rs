use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use batchkit_model::{TaskError, TaskOptions};
use tokio_util::sync::CancellationToken;

/// Per-item processing function supplied by the calling tool.
///
/// Implementations receive a shared reference to the input, the task options and a token
/// that is cancelled when the run is stopped. The scheduler never aborts a running
/// processor; observing the token is up to the implementation.
#[async_trait]
pub trait Processor<I, O>: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str {
        "processor"
    }

    async fn process(
        &self,
        input: Arc<I>,
        options: &TaskOptions,
        ctx: CancellationToken,
    ) -> Result<O, TaskError>;
}

/// Shared handle to a processor.
pub type ProcessorRef<I, O> = Arc<dyn Processor<I, O>>;

/// [`Processor`] backed by an async closure.
pub struct ProcessorFn<F> {
    name: &'static str,
    f: F,
}

impl<F> ProcessorFn<F> {
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }

    /// Wrap a closure and return it as a shareable [`ProcessorRef`].
    pub fn arc<I, O, Fut>(name: &'static str, f: F) -> ProcessorRef<I, O>
    where
        I: Send + Sync + 'static,
        O: Send + 'static,
        F: Fn(Arc<I>, TaskOptions, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, TaskError>> + Send + 'static,
    {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<I, O, F, Fut> Processor<I, O> for ProcessorFn<F>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
    F: Fn(Arc<I>, TaskOptions, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        self.name
    }

    async fn process(
        &self,
        input: Arc<I>,
        options: &TaskOptions,
        ctx: CancellationToken,
    ) -> Result<O, TaskError> {
        (self.f)(input, options.clone(), ctx).await
    }
}
