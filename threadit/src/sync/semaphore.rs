use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Shared handle to a semaphore that some party raises and another waits on.
pub type Signal = Arc<Semaphore>;

/// Returned by [`Semaphore::acquire_interruptibly`] when the cancel flag was
/// raised before a permit became available.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Semaphore acquisition interrupted")]
pub struct Interrupted;

/// Counting semaphore.
///
/// Permits are not tied to threads: any thread may release a permit that
/// another thread acquired.
#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Semaphore {
    /// Creates a semaphore holding `permits` permits.
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Creates a semaphore with one permit, usable as a lock.
    pub fn binary() -> Self {
        Self::new(1)
    }

    /// Creates a shareable [`Signal`] holding no permits.
    pub fn signal() -> Signal {
        Arc::new(Self::new(0))
    }

    /// Blocks until a permit is available and takes it.
    pub fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Takes a permit if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Waits up to `timeout` for a permit. Returns whether one was taken.
    pub fn try_acquire_for(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.acquire();
            return true;
        };

        let mut permits = self.permits.lock();
        while *permits == 0 {
            if self.available.wait_until(&mut permits, deadline).timed_out() {
                break;
            }
        }
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Blocks for a permit until one arrives or `cancel` is raised.
    ///
    /// The flag is checked before the permit count on every wake, so a
    /// cancelled waiter never consumes a permit. Whoever raises the flag
    /// must follow with [`interrupt_waiters`](Self::interrupt_waiters).
    pub fn acquire_interruptibly(&self, cancel: &AtomicBool) -> Result<(), Interrupted> {
        let mut permits = self.permits.lock();
        loop {
            if cancel.load(Ordering::Acquire) {
                return Err(Interrupted);
            }
            if *permits > 0 {
                *permits -= 1;
                return Ok(());
            }
            self.available.wait(&mut permits);
        }
    }

    /// Wakes every blocked waiter so it re-checks its cancel flag.
    pub fn interrupt_waiters(&self) {
        let _permits = self.permits.lock();
        self.available.notify_all();
    }

    /// Returns one permit.
    pub fn release(&self) {
        self.release_many(1);
    }

    /// Returns `count` permits.
    pub fn release_many(&self, count: usize) {
        if count == 0 {
            return;
        }
        let mut permits = self.permits.lock();
        *permits = permits.saturating_add(count);
        if count == 1 {
            self.available.notify_one();
        } else {
            self.available.notify_all();
        }
    }

    /// Permits currently available.
    pub fn available_permits(&self) -> usize {
        *self.permits.lock()
    }

    /// Takes every available permit and returns how many there were.
    pub fn drain_permits(&self) -> usize {
        std::mem::take(&mut *self.permits.lock())
    }
}
