use tokio::sync::mpsc;

use crate::events::{BatchEvent, Subscribe};

/// Forwards every event into an unbounded channel for async consumers.
///
/// Events sent after the receiver is dropped are discarded.
pub struct ChannelSubscriber {
    tx: mpsc::UnboundedSender<BatchEvent>,
}

impl ChannelSubscriber {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BatchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Subscribe for ChannelSubscriber {
    fn on_event(&self, event: &BatchEvent) {
        let _ = self.tx.send(event.clone());
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}
