//! FIFO of tasks awaiting dispatch.

use std::collections::VecDeque;

use batchkit_model::TaskId;

/// Tasks waiting for a slot, in strict enqueue order.
///
/// Once closed the queue accepts nothing; closing hands back whatever was still waiting.
#[derive(Debug, Default)]
pub struct TaskQueue {
    queue: VecDeque<TaskId>,
    closed: bool,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail. Returns `false` if the queue has been closed.
    pub fn enqueue(&mut self, id: TaskId) -> bool {
        if self.closed {
            return false;
        }
        self.queue.push_back(id);
        true
    }

    /// Remove and return the head.
    pub fn dequeue(&mut self) -> Option<TaskId> {
        self.queue.pop_front()
    }

    /// Reject further enqueues and drain the remaining tasks in order.
    pub fn close(&mut self) -> Vec<TaskId> {
        self.closed = true;
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
