//! # Multi-Signal Wait
//!
//! [`WaitForObjects`] lets one thread wait on several [`Signal`]s at once,
//! either for the first of them to fire or for all of them.
//!
//! Each watched signal gets a dedicated monitor thread that blocks on it
//! and forwards every acquisition, tagged with the signal's index, into a
//! shared ready queue. Waiters only ever block on that queue.
//!
//! ## Lifecycle
//! - Uninitialized: waits return [`WaitResult::NotInitialized`]
//! - Initialized: after [`init`](WaitForObjects::init)
//! - Stopped: after [`stop_waiting`](WaitForObjects::stop_waiting), which
//!   behaves like Uninitialized until the next `init`
//!
//! Every `init` starts a new generation. Forwarded signals carry the
//! generation of the monitor that saw them and waiters drop anything from
//! an older generation, so a signal that fires while monitors are being
//! replaced cannot satisfy a wait on the new set.
//!
//! Monitors consume permits. A signal watched by a `WaitForObjects` should
//! not also be acquired directly by other code.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error};

use super::{Semaphore, Signal};
use crate::error::SpawnError;
use crate::queue::BlockingQueue;
use crate::spawn::{NamedThreadFactory, ThreadFactory};

/// Outcome of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// For `wait_any`, the index of the signal that fired. For `wait_all`,
    /// the index whose firing completed the set.
    Succeeded(usize),
    /// The timeout elapsed first.
    TimedOut,
    /// The wait was cancelled through [`WaitForObjects::interrupt`].
    Terminated,
    /// No signals are being watched.
    NotInitialized,
}

impl WaitResult {
    pub fn is_success(&self) -> bool {
        matches!(self, WaitResult::Succeeded(_))
    }
}

#[derive(Debug, Clone, Copy)]
enum ReadyEvent {
    Signalled { index: usize, generation: u64 },
    Interrupted,
}

struct Monitor {
    signal: Signal,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Monitor {
    fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
        self.signal.interrupt_waiters();
    }
}

struct Watch {
    generation: u64,
    signals: Vec<Signal>,
    monitors: Vec<Monitor>,
}

/// Waits on any or all of a set of signals.
pub struct WaitForObjects {
    ready: Arc<BlockingQueue<ReadyEvent>>,
    watch: Mutex<Option<Watch>>,
    generation: AtomicU64,
    factory: Arc<dyn ThreadFactory>,
}

impl Default for WaitForObjects {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WaitForObjects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let watch = self.watch.lock();
        f.debug_struct("WaitForObjects")
            .field("initialized", &watch.is_some())
            .field("signals", &watch.as_ref().map_or(0, |w| w.signals.len()))
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}

impl WaitForObjects {
    /// Creates an uninitialized waiter whose monitors run on threads named
    /// `threadit-monitor-N`.
    pub fn new() -> Self {
        Self::with_thread_factory(Arc::new(NamedThreadFactory::new("threadit-monitor")))
    }

    pub fn with_thread_factory(factory: Arc<dyn ThreadFactory>) -> Self {
        Self {
            ready: Arc::new(BlockingQueue::new()),
            watch: Mutex::new(None),
            generation: AtomicU64::new(0),
            factory,
        }
    }

    /// Creates a waiter already watching `signals`.
    pub fn watching(signals: Vec<Signal>) -> Result<Self, SpawnError> {
        let waiter = Self::new();
        waiter.init(signals)?;
        Ok(waiter)
    }

    /// Starts watching `signals`, replacing any previous set.
    ///
    /// Watching an empty set leaves the waiter uninitialized. If a monitor
    /// thread cannot be started, the monitors already started are torn down
    /// and the waiter is left uninitialized.
    pub fn init(&self, signals: Vec<Signal>) -> Result<(), SpawnError> {
        self.stop_waiting();
        self.ready.clear();
        if signals.is_empty() {
            return Ok(());
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let mut monitors = Vec::with_capacity(signals.len());
        for (index, signal) in signals.iter().enumerate() {
            match self.spawn_monitor(index, generation, signal) {
                Ok(monitor) => monitors.push(monitor),
                Err(err) => {
                    error!(index, error = %err, "Failed to start wait monitor");
                    shutdown_monitors(&mut monitors);
                    return Err(SpawnError::Thread(err));
                }
            }
        }

        debug!(generation, signals = signals.len(), "Watching signals");
        *self.watch.lock() = Some(Watch {
            generation,
            signals,
            monitors,
        });
        Ok(())
    }

    fn spawn_monitor(
        &self,
        index: usize,
        generation: u64,
        signal: &Signal,
    ) -> std::io::Result<Monitor> {
        let cancel = Arc::new(AtomicBool::new(false));
        let job = {
            let signal = Arc::clone(signal);
            let cancel = Arc::clone(&cancel);
            let ready = Arc::clone(&self.ready);
            Box::new(move || {
                while signal.acquire_interruptibly(&cancel).is_ok() {
                    ready.push_back(ReadyEvent::Signalled { index, generation });
                }
                debug!(index, generation, "Wait monitor stopped");
            })
        };
        let handle = self.factory.spawn(None, job)?;
        Ok(Monitor {
            signal: Arc::clone(signal),
            cancel,
            handle: Some(handle),
        })
    }

    /// Number of signals being watched.
    pub fn len(&self) -> usize {
        self.watch.lock().as_ref().map_or(0, |w| w.signals.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_initialized(&self) -> bool {
        self.watch.lock().is_some()
    }

    /// Raises the signal at `index`. Returns `false` if uninitialized or if
    /// `index` is out of range.
    pub fn signal(&self, index: usize) -> bool {
        match self.watch.lock().as_ref().and_then(|w| w.signals.get(index)) {
            Some(signal) => {
                signal.release();
                true
            }
            None => false,
        }
    }

    /// The signal at `index`, for handing to a producer.
    pub fn get(&self, index: usize) -> Option<Signal> {
        self.watch
            .lock()
            .as_ref()
            .and_then(|w| w.signals.get(index).cloned())
    }

    /// Waits for any watched signal to fire.
    ///
    /// `Duration::MAX` waits without limit.
    pub fn wait_any(&self, timeout: Duration) -> WaitResult {
        let Some((generation, _)) = self.current() else {
            return WaitResult::NotInitialized;
        };
        let deadline = Instant::now().checked_add(timeout);

        loop {
            match self.next_event(deadline) {
                None => return WaitResult::TimedOut,
                Some(ReadyEvent::Interrupted) => return WaitResult::Terminated,
                Some(ReadyEvent::Signalled { index, generation: g }) if g == generation => {
                    return WaitResult::Succeeded(index);
                }
                Some(ReadyEvent::Signalled { .. }) => continue,
            }
        }
    }

    /// Waits until every watched signal has fired at least once.
    ///
    /// Repeated firings of one signal count once. Remaining time is
    /// recomputed from the clock between events; once it reaches zero the
    /// result is [`WaitResult::TimedOut`] unless an already queued event
    /// completes the set.
    pub fn wait_all(&self, timeout: Duration) -> WaitResult {
        let Some((generation, count)) = self.current() else {
            return WaitResult::NotInitialized;
        };
        let deadline = Instant::now().checked_add(timeout);
        let mut seen = vec![false; count];
        let mut outstanding = count;

        loop {
            match self.next_event(deadline) {
                None => return WaitResult::TimedOut,
                Some(ReadyEvent::Interrupted) => return WaitResult::Terminated,
                Some(ReadyEvent::Signalled { index, generation: g }) => {
                    if g != generation || index >= count || seen[index] {
                        continue;
                    }
                    seen[index] = true;
                    outstanding -= 1;
                    if outstanding == 0 {
                        return WaitResult::Succeeded(index);
                    }
                }
            }
        }
    }

    /// Cancels the wait in progress, which returns
    /// [`WaitResult::Terminated`].
    ///
    /// If nobody is waiting, the next wait is the one cancelled.
    pub fn interrupt(&self) {
        self.ready.push_front(ReadyEvent::Interrupted);
    }

    /// Stops every monitor thread and forgets the watched signals.
    /// Calling it again is a no-op.
    pub fn stop_waiting(&self) {
        let Some(mut watch) = self.watch.lock().take() else {
            return;
        };
        shutdown_monitors(&mut watch.monitors);
        debug!(generation = watch.generation, "Stopped watching signals");
    }

    /// One-shot [`wait_any`](Self::wait_any) over `signals`.
    ///
    /// Starts and stops a monitor thread per signal on every call, so it is
    /// considerably more expensive than reusing a `WaitForObjects`.
    pub fn wait_any_of(signals: &[Signal], timeout: Duration) -> WaitResult {
        Self::one_shot(signals, |waiter| waiter.wait_any(timeout))
    }

    /// One-shot [`wait_all`](Self::wait_all) over `signals`. Same cost
    /// caveat as [`wait_any_of`](Self::wait_any_of).
    pub fn wait_all_of(signals: &[Signal], timeout: Duration) -> WaitResult {
        Self::one_shot(signals, |waiter| waiter.wait_all(timeout))
    }

    fn one_shot(signals: &[Signal], wait: impl FnOnce(&Self) -> WaitResult) -> WaitResult {
        let waiter = Self::new();
        if let Err(err) = waiter.init(signals.to_vec()) {
            error!(error = %err, "One-shot wait could not start its monitors");
            return WaitResult::NotInitialized;
        }
        let result = wait(&waiter);
        waiter.stop_waiting();
        result
    }

    fn current(&self) -> Option<(u64, usize)> {
        self.watch
            .lock()
            .as_ref()
            .map(|w| (w.generation, w.signals.len()))
    }

    fn next_event(&self, deadline: Option<Instant>) -> Option<ReadyEvent> {
        match deadline {
            Some(deadline) => self
                .ready
                .poll(deadline.saturating_duration_since(Instant::now())),
            None => Some(self.ready.take()),
        }
    }
}

impl Drop for WaitForObjects {
    fn drop(&mut self) {
        self.stop_waiting();
    }
}

fn shutdown_monitors(monitors: &mut [Monitor]) {
    for monitor in monitors.iter() {
        monitor.cancel();
    }
    for monitor in monitors.iter_mut() {
        if let Some(handle) = monitor.handle.take() {
            if handle.join().is_err() {
                error!("Wait monitor thread panicked");
            }
        }
    }
}

/// Creates `count` fresh signals, convenient for building a watch set.
pub fn signals(count: usize) -> Vec<Signal> {
    (0..count).map(|_| Semaphore::signal()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_uninitialized() {
        let waiter = WaitForObjects::new();
        assert_eq!(waiter.wait_any(Duration::from_millis(10)), WaitResult::NotInitialized);
        assert_eq!(waiter.wait_all(Duration::from_millis(10)), WaitResult::NotInitialized);
        assert!(!waiter.signal(0));
    }

    #[test]
    fn test_empty_set_is_uninitialized() {
        let waiter = WaitForObjects::new();
        waiter.init(Vec::new()).unwrap();
        assert!(!waiter.is_initialized());
        assert_eq!(waiter.wait_any(Duration::from_millis(10)), WaitResult::NotInitialized);
    }

    #[test]
    fn test_signal_out_of_range() {
        let waiter = WaitForObjects::watching(signals(2)).unwrap();
        assert!(!waiter.signal(2));
        assert!(waiter.signal(1));
        assert_eq!(waiter.wait_any(Duration::from_secs(5)), WaitResult::Succeeded(1));
    }

    #[test]
    fn test_reinit_discards_previous_set() {
        let waiter = WaitForObjects::watching(signals(3)).unwrap();
        waiter.init(signals(1)).unwrap();
        assert_eq!(waiter.len(), 1);
        assert!(!waiter.signal(2));
    }

    #[test]
    fn test_interrupt_terminates_wait() {
        let waiter = Arc::new(WaitForObjects::watching(signals(1)).unwrap());
        let other = Arc::clone(&waiter);
        let handle = thread::spawn(move || other.wait_any(Duration::MAX));

        thread::sleep(Duration::from_millis(30));
        waiter.interrupt();
        assert_eq!(handle.join().unwrap(), WaitResult::Terminated);
    }

    #[test]
    fn test_stop_waiting_is_idempotent() {
        let waiter = WaitForObjects::watching(signals(2)).unwrap();
        waiter.stop_waiting();
        waiter.stop_waiting();
        assert!(!waiter.is_initialized());
        assert_eq!(waiter.wait_any(Duration::from_millis(5)), WaitResult::NotInitialized);
    }
}
