use std::{
    collections::VecDeque,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use batchkit_model::BatchStats;
use tokio::sync::watch;
use tracing::error;

use crate::events::{BatchEvent, Subscribe};

/// Ordered, in-process event delivery.
///
/// `publish` only appends to the outbox and is called while the run lock is held, which fixes
/// the order. `flush` is called after the run lock is released; at most one thread delivers
/// at a time and it keeps draining until the outbox is empty, so events published while a
/// delivery is in progress (including from inside a subscriber) are not lost.
pub(crate) struct Bus {
    subscribers: Vec<Arc<dyn Subscribe>>,
    outbox: Mutex<VecDeque<BatchEvent>>,
    delivering: AtomicBool,
    settled: watch::Sender<Option<BatchStats>>,
}

impl Bus {
    pub fn new(subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let (settled, _) = watch::channel(None);
        Self {
            subscribers,
            outbox: Mutex::new(VecDeque::new()),
            delivering: AtomicBool::new(false),
            settled,
        }
    }

    pub fn publish(&self, event: BatchEvent) {
        self.outbox().push_back(event);
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = BatchEvent>) {
        self.outbox().extend(events);
    }

    pub fn flush(&self) {
        loop {
            if self
                .delivering
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }

            while let Some(event) = self.pop() {
                self.deliver(&event);
            }

            self.delivering.store(false, Ordering::Release);
            if self.outbox().is_empty() {
                return;
            }
        }
    }

    /// Receiver that turns `Some` once `BatchSettled` has reached every subscriber.
    pub fn settled(&self) -> watch::Receiver<Option<BatchStats>> {
        self.settled.subscribe()
    }

    fn deliver(&self, event: &BatchEvent) {
        for sub in &self.subscribers {
            if catch_unwind(AssertUnwindSafe(|| sub.on_event(event))).is_err() {
                error!(
                    subscriber = sub.name(),
                    kind = ?event.kind(),
                    "subscriber panicked while processing an event"
                );
            }
        }
        if let BatchEvent::BatchSettled { stats, .. } = event {
            self.settled.send_replace(Some(stats.clone()));
        }
    }

    fn pop(&self) -> Option<BatchEvent> {
        self.outbox().pop_front()
    }

    fn outbox(&self) -> MutexGuard<'_, VecDeque<BatchEvent>> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
