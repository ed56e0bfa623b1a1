use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::{Semaphore, Signal};
use crate::queue::BlockingQueue;

/// A [`BlockingQueue`] that raises a [`Signal`] on every insert.
///
/// The signal's permit count tracks the number of inserts not yet matched by
/// a permit acquisition, which lets the queue be watched by a
/// [`WaitForObjects`](super::WaitForObjects) alongside other signals.
/// Items can still be removed directly; doing so does not take a permit.
pub struct SignalQueue<T> {
    queue: BlockingQueue<T>,
    signal: Signal,
}

impl<T> fmt::Debug for SignalQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalQueue")
            .field("len", &self.queue.len())
            .field("permits", &self.signal.available_permits())
            .finish()
    }
}

impl<T> Default for SignalQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SignalQueue<T> {
    pub fn new() -> Self {
        Self::with_signal(Semaphore::signal())
    }

    /// Uses an existing signal, e.g. one already registered with a waiter.
    pub fn with_signal(signal: Signal) -> Self {
        Self {
            queue: BlockingQueue::new(),
            signal,
        }
    }

    /// The signal raised on insert.
    pub fn signal(&self) -> Signal {
        Arc::clone(&self.signal)
    }

    pub fn push_back(&self, item: T) {
        self.queue.push_back(item);
        self.signal.release();
    }

    pub fn push_front(&self, item: T) {
        self.queue.push_front(item);
        self.signal.release();
    }

    pub fn try_pop(&self) -> Option<T> {
        self.queue.try_pop()
    }

    pub fn poll(&self, timeout: Duration) -> Option<T> {
        self.queue.poll(timeout)
    }

    pub fn take(&self) -> T {
        self.queue.take()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Discards all items and any permits raised for them.
    pub fn clear(&self) {
        self.queue.clear();
        self.signal.drain_permits();
    }

    /// The underlying queue.
    pub fn queue(&self) -> &BlockingQueue<T> {
        &self.queue
    }
}
