//! Bounded-concurrency batch scheduler.
//!
//! A [`BatchController`] owns one run: callers enqueue tasks, call [`BatchController::start`],
//! and observe the run through [`Subscribe`] implementations. At most `max_concurrency`
//! processing functions execute at once; a failing task never affects its siblings.
//!
//! | Module | Role |
//! |--------|------|
//! | [`queue`] | FIFO of tasks awaiting dispatch |
//! | [`slots`] | concurrency limit bookkeeping |
//! | [`worker`] | runs one processing function and isolates its failure |
//! | [`progress`] | turns task settlements into progress snapshots and final stats |
//! | [`events`] | typed events, listener trait and ordered delivery |
//! | [`controller`] | the public orchestrator |

mod error;
pub use error::CoreError;

mod config;
pub use config::BatchConfig;

mod processor;
pub use processor::{Processor, ProcessorFn, ProcessorRef};

mod task;
pub use task::TaskSnapshot;

mod state;

pub mod events;
pub use events::{BatchEvent, Callbacks, ChannelSubscriber, EventKind, Subscribe};

pub mod progress;
pub mod queue;
pub mod slots;
pub mod worker;

pub mod controller;
pub use controller::BatchController;

pub use tokio_util::sync::CancellationToken;

pub mod prelude {
    pub use crate::{
        BatchConfig, BatchController, BatchEvent, Callbacks, CancellationToken, CoreError,
        Processor, ProcessorFn, ProcessorRef, Subscribe,
    };
    pub use batchkit_model::{
        BatchStats, ProgressSnapshot, RunState, TaskError, TaskId, TaskInfo, TaskOptions,
        TaskStatus,
    };
}
