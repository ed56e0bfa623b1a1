//! # Active Objects
//!
//! An active object owns one dedicated thread, a work queue and a done
//! queue. Work submitted from any thread is executed serially on the
//! object's thread by the handler registered for the item's instruction,
//! and results come back through the done queue, a caller-supplied queue or
//! a callback.
//!
//! ## Key Concepts
//! - [`ActiveObjectBuilder`]: registers handlers and starts the thread
//! - [`ActiveObject`]: the owner; stops the object when dropped and can
//!   shut it down and recover its state
//! - [`ActiveObjectRef`] / [`WeakActiveObjectRef`]: shared and non-owning
//!   handles for submitting work and wiring objects together
//! - [`WorkContext`]: what a handler can do besides compute its result
//!
//! ## Ordering
//! Items are processed one at a time in submission order, except that
//! events are queued ahead of waiting normal items. Periodic ticks run
//! between items, never during one.

use std::fmt;
use std::ops::Deref;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::{ShutdownError, panic_message};
use crate::work::WorkItem;

mod builder;
mod context;
mod handle;
mod runtime;

pub use builder::ActiveObjectBuilder;
pub use context::WorkContext;
pub use handle::{ActiveObjectRef, LifecycleState, WeakActiveObjectRef};

/// What a handler returns.
///
/// - `Ok(Some(item))`: the result to deliver. A status still `Pending` is
///   reported as `Ok`.
/// - `Ok(None)`: no result; a copy of the input is delivered with status
///   `NoResult`.
/// - `Err(_)`: logged; a copy of the input is delivered with status
///   `Failed`.
pub type HandlerResult = anyhow::Result<Option<WorkItem>>;

/// A registered handler, run on the object's thread with exclusive access
/// to its state.
pub type Handler<S> =
    Box<dyn FnMut(&mut S, &mut WorkContext<'_>, &WorkItem) -> HandlerResult + Send>;

/// Owner of an active object.
///
/// Dereferences to [`ActiveObjectRef`] for submitting work. Dropping the
/// owner requests a stop but does not wait for it; use
/// [`shutdown`](Self::shutdown) to wait and get the state back.
pub struct ActiveObject<S> {
    handle: ActiveObjectRef,
    thread: Option<JoinHandle<()>>,
    state_rx: flume::Receiver<S>,
}

impl<S> fmt::Debug for ActiveObject<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveObject")
            .field("handle", &self.handle)
            .field("joined", &self.thread.is_none())
            .finish()
    }
}

impl<S> ActiveObject<S> {
    pub(crate) fn new(
        handle: ActiveObjectRef,
        thread: JoinHandle<()>,
        state_rx: flume::Receiver<S>,
    ) -> Self {
        Self {
            handle,
            thread: Some(thread),
            state_rx,
        }
    }

    /// A shared handle to this object.
    pub fn handle(&self) -> ActiveObjectRef {
        self.handle.clone()
    }

    /// Stops the object, waits up to `timeout` for its thread to exit and
    /// returns the state the handlers were working on.
    ///
    /// # Errors
    /// - [`ShutdownError::Timeout`] if the thread is still running after
    ///   `timeout`; it keeps its stop request and exits on its own later
    /// - [`ShutdownError::Panicked`] if the thread died
    pub fn shutdown(mut self, timeout: Duration) -> Result<S, ShutdownError> {
        self.handle.stop();
        if !self.handle.wait_for_stop(timeout) {
            return Err(ShutdownError::Timeout(timeout));
        }
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|payload| ShutdownError::Panicked(panic_message(payload.as_ref())))?;
        }
        self.state_rx.try_recv().map_err(|_| {
            ShutdownError::Panicked("thread exited without returning its state".to_string())
        })
    }
}

impl<S> Deref for ActiveObject<S> {
    type Target = ActiveObjectRef;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl<S> Drop for ActiveObject<S> {
    fn drop(&mut self) {
        self.handle.stop();
    }
}
