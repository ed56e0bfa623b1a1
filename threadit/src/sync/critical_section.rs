//! # Re-entrant Critical Section
//!
//! A mutual-exclusion section that the owning thread may enter repeatedly.
//! Ownership is tracked separately from the underlying binary semaphore:
//! nested entries by the owner only bump a counter and never touch the
//! semaphore, so the single permit is consumed once per ownership period
//! rather than once per entry.

use std::fmt;
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::error;

use super::Semaphore;

#[derive(Debug, Default)]
struct Ownership {
    owner: Option<ThreadId>,
    lock_count: u64,
}

/// Re-entrant lock built on a binary semaphore.
///
/// Every successful acquisition must be paired with a
/// [`release`](Self::release) from the same thread, or use
/// [`enter`](Self::enter) for a scoped guard. Misuse (releasing from a
/// thread that does not hold the section) is logged and ignored.
pub struct CriticalSection {
    ownership: Mutex<Ownership>,
    permit: Semaphore,
}

impl Default for CriticalSection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CriticalSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ownership = self.ownership.lock();
        f.debug_struct("CriticalSection")
            .field("owner", &ownership.owner)
            .field("lock_count", &ownership.lock_count)
            .finish()
    }
}

impl CriticalSection {
    pub fn new() -> Self {
        Self {
            ownership: Mutex::new(Ownership::default()),
            permit: Semaphore::binary(),
        }
    }

    /// Enters the section, blocking until it is free.
    ///
    /// Returns `false` only if the section's bookkeeping was found
    /// inconsistent after taking the permit; the error is logged.
    pub fn acquire(&self) -> bool {
        if self.reenter() {
            return true;
        }
        self.permit.acquire();
        self.claim()
    }

    /// Enters the section, waiting at most `timeout` for it to become free.
    pub fn acquire_for(&self, timeout: Duration) -> bool {
        if self.reenter() {
            return true;
        }
        if !self.permit.try_acquire_for(timeout) {
            return false;
        }
        self.claim()
    }

    /// Leaves the section once. The section is free again after as many
    /// releases as there were acquisitions.
    pub fn release(&self) {
        let me = thread::current().id();
        let mut ownership = self.ownership.lock();

        match ownership.owner {
            None => {
                error!(thread = ?me, "CriticalSection released while not held");
            }
            Some(owner) if owner != me => {
                error!(
                    thread = ?me,
                    owner = ?owner,
                    "CriticalSection released by a thread that does not own it"
                );
            }
            Some(_) => {
                ownership.lock_count -= 1;
                if ownership.lock_count == 0 {
                    ownership.owner = None;
                    drop(ownership);
                    self.permit.release();
                }
            }
        }
    }

    /// Enters the section and returns a guard that leaves it when dropped.
    pub fn enter(&self) -> Option<CriticalSectionGuard<'_>> {
        self.acquire().then(|| CriticalSectionGuard { section: self })
    }

    /// Like [`enter`](Self::enter) with a bounded wait.
    pub fn enter_for(&self, timeout: Duration) -> Option<CriticalSectionGuard<'_>> {
        self.acquire_for(timeout)
            .then(|| CriticalSectionGuard { section: self })
    }

    /// Whether the calling thread currently owns the section.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.ownership.lock().owner == Some(thread::current().id())
    }

    /// Number of outstanding acquisitions by the current owner.
    pub fn lock_count(&self) -> u64 {
        self.ownership.lock().lock_count
    }

    /// Fast path: the caller already owns the section.
    fn reenter(&self) -> bool {
        let mut ownership = self.ownership.lock();
        if ownership.owner == Some(thread::current().id()) {
            ownership.lock_count += 1;
            true
        } else {
            false
        }
    }

    /// Records the caller as owner after taking the permit.
    fn claim(&self) -> bool {
        let me = thread::current().id();
        let mut ownership = self.ownership.lock();
        if let Some(owner) = ownership.owner {
            error!(
                thread = ?me,
                owner = ?owner,
                lock_count = ownership.lock_count,
                "CriticalSection permit acquired while another thread is recorded as owner"
            );
            drop(ownership);
            self.permit.release();
            return false;
        }
        ownership.owner = Some(me);
        ownership.lock_count = 1;
        true
    }
}

/// Scoped ownership of a [`CriticalSection`].
#[must_use = "the section is released as soon as the guard is dropped"]
pub struct CriticalSectionGuard<'a> {
    section: &'a CriticalSection,
}

impl Drop for CriticalSectionGuard<'_> {
    fn drop(&mut self) {
        self.section.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    #[test]
    fn test_reentrant_acquire() {
        let cs = CriticalSection::new();
        for _ in 0..3 {
            assert!(cs.acquire());
        }
        assert_eq!(cs.lock_count(), 3);
        assert!(cs.is_held_by_current_thread());

        cs.release();
        cs.release();
        assert!(cs.is_held_by_current_thread());
        cs.release();
        assert!(!cs.is_held_by_current_thread());
        assert_eq!(cs.lock_count(), 0);
    }

    #[test]
    fn test_other_thread_blocks_until_final_release() {
        let cs = Arc::new(CriticalSection::new());
        assert!(cs.acquire());
        assert!(cs.acquire());

        let entered = Arc::new(AtomicBool::new(false));
        let (section, flag) = (Arc::clone(&cs), Arc::clone(&entered));
        let handle = thread::spawn(move || {
            assert!(section.acquire());
            flag.store(true, Ordering::SeqCst);
            section.release();
        });

        thread::sleep(Duration::from_millis(30));
        cs.release();
        thread::sleep(Duration::from_millis(30));
        assert!(!entered.load(Ordering::SeqCst));

        cs.release();
        handle.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_timed_acquire_fails_while_held() {
        let cs = Arc::new(CriticalSection::new());
        let _guard = cs.enter().unwrap();

        let section = Arc::clone(&cs);
        let handle = thread::spawn(move || {
            let start = Instant::now();
            let acquired = section.acquire_for(Duration::from_millis(40));
            (acquired, start.elapsed())
        });
        let (acquired, waited) = handle.join().unwrap();
        assert!(!acquired);
        assert!(waited >= Duration::from_millis(40));
    }

    #[test]
    fn test_release_without_owner_is_ignored() {
        let cs = CriticalSection::new();
        cs.release();
        assert!(cs.acquire_for(Duration::from_millis(10)));
        cs.release();
    }

    #[test]
    fn test_release_by_non_owner_is_ignored() {
        let cs = Arc::new(CriticalSection::new());
        assert!(cs.acquire());

        let section = Arc::clone(&cs);
        thread::spawn(move || section.release()).join().unwrap();

        assert!(cs.is_held_by_current_thread());
        assert_eq!(cs.lock_count(), 1);
        cs.release();
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let cs = CriticalSection::new();
        {
            let _outer = cs.enter().unwrap();
            let _inner = cs.enter().unwrap();
            assert_eq!(cs.lock_count(), 2);
        }
        assert_eq!(cs.lock_count(), 0);
        assert!(!cs.is_held_by_current_thread());
    }
}
