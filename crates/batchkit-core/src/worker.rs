//! Execution of a single task.
//!
//! The processing function runs in its own tokio task so that a panic surfaces as a
//! [`JoinError`](tokio::task::JoinError) instead of unwinding through the scheduler. Every
//! outcome, panics and timeouts included, is folded into `Result<O, TaskError>`.

use std::{any::Any, sync::Arc, time::Duration};

use batchkit_model::{TaskError, TaskId, TaskOptions};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::processor::ProcessorRef;

/// Everything a worker needs to run one task, detached from the task table.
pub struct Job<I, O> {
    pub id: TaskId,
    pub input: Arc<I>,
    pub processor: ProcessorRef<I, O>,
    pub options: TaskOptions,
    pub timeout: Option<Duration>,
    pub ctx: CancellationToken,
}

/// Run the job's processing function to completion and capture its outcome.
///
/// Never panics and never returns early on behalf of other tasks; `ctx` is only forwarded.
pub async fn execute<I, O>(job: Job<I, O>) -> Result<O, TaskError>
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    let Job {
        id,
        input,
        processor,
        options,
        timeout,
        ctx,
    } = job;

    trace!(task = %id, processor = processor.name(), "processing started");
    let mut handle =
        tokio::spawn(async move { processor.process(input, &options, ctx).await });

    let joined = match timeout {
        None => (&mut handle).await,
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                let timeout_ms = limit.as_millis() as u64;
                warn!(task = %id, timeout_ms, "task exceeded its timeout; aborted");
                return Err(TaskError::Timeout { timeout_ms });
            }
        },
    };

    match joined {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => Err(TaskError::Panicked {
            reason: panic_message(e.into_panic()),
        }),
        Err(e) => Err(TaskError::fail(e)),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(s) => *s,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(s) => (*s).to_string(),
            Err(_) => "unknown panic payload".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::ProcessorFn;

    fn job<O: Send + 'static>(processor: ProcessorRef<u32, O>, timeout: Option<Duration>) -> Job<u32, O> {
        Job {
            id: TaskId::new(1),
            input: Arc::new(21),
            processor,
            options: TaskOptions::new(),
            timeout,
            ctx: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn success_returns_value() {
        let p = ProcessorFn::arc("double", |i: Arc<u32>, _opts, _ctx| async move { Ok(*i * 2) });
        assert_eq!(execute(job(p, None)).await, Ok(42));
    }

    #[tokio::test]
    async fn error_is_captured() {
        let p = ProcessorFn::arc("fail", |_i: Arc<u32>, _opts, _ctx| async move {
            Err::<u32, _>(TaskError::fail("unsupported format"))
        });
        assert_eq!(
            execute(job(p, None)).await,
            Err(TaskError::fail("unsupported format"))
        );
    }

    #[tokio::test]
    async fn panic_is_captured() {
        let p = ProcessorFn::arc("panic", |_i: Arc<u32>, _opts, _ctx| async move {
            if true {
                panic!("decoder exploded");
            }
            Ok::<u32, TaskError>(0)
        });

        let out = execute(job(p, None)).await;
        assert_eq!(
            out,
            Err(TaskError::Panicked {
                reason: "decoder exploded".to_string()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported() {
        let p = ProcessorFn::arc("slow", |_i: Arc<u32>, _opts, _ctx| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<u32, TaskError>(0)
        });

        let out = execute(job(p, Some(Duration::from_millis(250)))).await;
        assert_eq!(out, Err(TaskError::Timeout { timeout_ms: 250 }));
    }

    #[tokio::test]
    async fn cancellation_token_is_forwarded() {
        let p = ProcessorFn::arc("watch", |_i: Arc<u32>, _opts, ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Err::<u32, _>(TaskError::Canceled)
        });

        let mut j = job(p, None);
        let token = CancellationToken::new();
        j.ctx = token.clone();
        token.cancel();

        assert_eq!(execute(j).await, Err(TaskError::Canceled));
    }
}
