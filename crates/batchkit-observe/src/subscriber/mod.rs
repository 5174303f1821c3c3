mod view;
pub use view::{View, log_event, message_for};

use batchkit_core::{BatchEvent, Subscribe};

/// Forwards every batch event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSubscriber;

impl LogSubscriber {
    pub fn new() -> Self {
        Self
    }
}

impl Subscribe for LogSubscriber {
    fn on_event(&self, event: &BatchEvent) {
        log_event(event);
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
