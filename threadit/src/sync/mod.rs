//! # Synchronisation Primitives
//!
//! Building blocks the active object runtime is made of, exported for use
//! on their own:
//!
//! - [`Semaphore`]: counting semaphore with interruptible acquisition
//! - [`CriticalSection`]: re-entrant lock on a binary semaphore
//! - [`WaitForObjects`]: wait for any or all of several signals
//! - [`SignalQueue`]: a blocking queue that raises a signal per insert

pub mod critical_section;
pub mod semaphore;
pub mod signal_queue;
pub mod wait_for_objects;

pub use critical_section::{CriticalSection, CriticalSectionGuard};
pub use semaphore::{Interrupted, Semaphore, Signal};
pub use signal_queue::SignalQueue;
pub use wait_for_objects::{WaitForObjects, WaitResult, signals};
