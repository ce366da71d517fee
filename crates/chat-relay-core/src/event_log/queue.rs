//! Bounded FIFO queue shared between event producers and log workers.
//!
//! Producers never wait on this queue: [`BoundedQueue::try_enqueue`] either
//! accepts the item immediately or reports the queue as full or closed.
//! Consumers block in [`BoundedQueue::dequeue_blocking`] until an item arrives
//! or the queue has been closed and fully drained.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::{Mutex, MutexGuard};

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

/// Reason an item was rejected by [`BoundedQueue::try_enqueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue holds `capacity` items
    Full,
    /// [`BoundedQueue::close_for_writes`] has been called
    Closed,
}

/// Fixed-capacity FIFO queue with a "closed for writes" signal
///
/// Backed by a bounded crossbeam channel. Closing drops the only sender, so
/// consumers see the disconnect only after every buffered item was taken.
pub struct BoundedQueue<T> {
    sender: Mutex<Option<Sender<T>>>,
    receiver: Receiver<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Create an empty queue holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `item` without waiting for space
    ///
    /// The rejected item is dropped; the caller only learns why.
    pub fn try_enqueue(&self, item: T) -> Result<(), EnqueueError> {
        let sender = self.sender();
        let Some(sender) = sender.as_ref() else {
            return Err(EnqueueError::Closed);
        };

        sender.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => EnqueueError::Full,
            TrySendError::Disconnected(_) => EnqueueError::Closed,
        })
    }

    /// Take the oldest item, waiting until one is available
    ///
    /// Returns `None` once the queue is closed and empty; items buffered
    /// before the close are still handed out first.
    pub fn dequeue_blocking(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    /// Reject all further writes and wake every waiting consumer
    ///
    /// Already buffered items stay available to [`dequeue_blocking`](Self::dequeue_blocking).
    pub fn close_for_writes(&self) {
        self.sender().take();
    }

    // try_send never panics while the lock is held, so a poisoned lock still
    // guards a consistent sender.
    fn sender(&self) -> MutexGuard<'_, Option<Sender<T>>> {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
