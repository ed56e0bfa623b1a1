use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::work::{WorkId, WorkItem};

/// A thread-safe double-ended queue with blocking retrieval.
///
/// `BlockingQueue` carries work into an active object and results out of
/// it. Items normally join at the tail; [`push_front`](Self::push_front)
/// places an item ahead of everything already queued, which is how events
/// jump ahead of ordinary work.
///
/// # Thread Safety
/// - All operations take the internal lock and are safe for any number of
///   producers and consumers
/// - Blocked consumers are woken through a condition variable; spurious
///   wake-ups are absorbed internally
///
/// # Snapshot Reads
/// [`len`](Self::len), [`is_empty`](Self::is_empty) and [`get`](Self::get)
/// describe the queue at the instant the lock was held. With concurrent
/// producers or consumers the answer may be stale by the time it is used.
pub struct BlockingQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingQueue")
            .field("len", &self.len())
            .finish()
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BlockingQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Appends an item at the tail.
    pub fn push_back(&self, item: T) {
        self.items.lock().push_back(item);
        self.available.notify_one();
    }

    /// Inserts an item at the head, ahead of everything already queued.
    pub fn push_front(&self, item: T) {
        self.items.lock().push_front(item);
        self.available.notify_one();
    }

    /// Removes the head item without blocking.
    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Removes the head item, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `None` if the queue stayed empty for the whole timeout.
    pub fn poll(&self, timeout: Duration) -> Option<T> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            // Too far in the future to represent: same as waiting forever.
            return Some(self.take());
        };

        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            if self.available.wait_until(&mut items, deadline).timed_out() {
                return items.pop_front();
            }
        }
    }

    /// Removes the head item, waiting as long as it takes for one to arrive.
    pub fn take(&self) -> T {
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return item;
            }
            self.available.wait(&mut items);
        }
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Discards every queued item.
    pub fn clear(&self) {
        self.items.lock().clear();
    }

    /// Removes and returns every queued item, head first.
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).collect()
    }

    /// Removes the first item matching `predicate`, scanning from the head.
    pub fn remove_by<F>(&self, mut predicate: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        let mut items = self.items.lock();
        let index = items.iter().position(|item| predicate(item))?;
        items.remove(index)
    }

    /// Reads the item at `index` (0 is the head) without removing it.
    ///
    /// This is an O(n) scan intended for inspecting a queue, not for
    /// consuming it.
    pub fn get(&self, index: usize) -> Option<T>
    where
        T: Clone,
    {
        self.items.lock().get(index).cloned()
    }

    /// Removes the first item equal to `item`. Returns whether one was found.
    ///
    /// Work items have no equality; remove them by id with
    /// [`remove_work`](BlockingQueue::remove_work).
    pub fn remove(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.remove_by(|queued| queued == item).is_some()
    }

    /// Wakes every blocked consumer without supplying an item.
    ///
    /// Consumers re-check the queue and go back to waiting, so this only
    /// matters to code that inspects state outside the queue between waits.
    pub fn notify_all(&self) {
        let _items = self.items.lock();
        self.available.notify_all();
    }
}

impl BlockingQueue<WorkItem> {
    /// Removes the queued work item with id `id`, if it has not been taken
    /// yet. Ids are unique per active object, so this identifies one item.
    pub fn remove_work(&self, id: WorkId) -> Option<WorkItem> {
        self.remove_by(|item| item.id() == id)
    }
}
