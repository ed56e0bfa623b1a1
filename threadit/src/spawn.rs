use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use tracing::error;

use crate::error::panic_message;
use crate::logging;

/// A unit of work to run on a freshly spawned thread.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Policy for creating the OS threads that active objects and wait monitors
/// run on.
///
/// Implementations are injected through builders so that hosts can control
/// naming, stack sizes or instrumentation without global state.
pub trait ThreadFactory: Send + Sync {
    /// Starts `job` on a new thread.
    ///
    /// `name` is the caller's preferred thread name; factories may ignore it
    /// and pick their own when it is `None`.
    fn spawn(&self, name: Option<String>, job: Job) -> io::Result<JoinHandle<()>>;
}

/// Default [`ThreadFactory`] producing threads named `prefix-N`.
///
/// Spawned threads inherit the tracing dispatcher that was current when the
/// factory was asked to spawn, and a panic escaping the job is logged
/// before it propagates to the join handle.
#[derive(Debug)]
pub struct NamedThreadFactory {
    prefix: String,
    counter: AtomicUsize,
    stack_size: Option<usize>,
}

impl Default for NamedThreadFactory {
    fn default() -> Self {
        Self::new("threadit-worker")
    }
}

impl NamedThreadFactory {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicUsize::new(0),
            stack_size: None,
        }
    }

    /// Sets the stack size, in bytes, of spawned threads.
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of threads this factory has started.
    pub fn spawned(&self) -> usize {
        self.counter.load(Ordering::Relaxed)
    }

    fn next_name(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.prefix, n)
    }
}

impl ThreadFactory for NamedThreadFactory {
    fn spawn(&self, name: Option<String>, job: Job) -> io::Result<JoinHandle<()>> {
        let name = match name {
            Some(name) => {
                self.counter.fetch_add(1, Ordering::Relaxed);
                name
            }
            None => self.next_name(),
        };

        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }

        let dispatch = logging::current_subscriber();
        builder.spawn(move || {
            tracing::dispatcher::with_default(&dispatch, || {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                    error!(
                        thread = %name,
                        panic = %panic_message(payload.as_ref()),
                        "Thread terminated by panic"
                    );
                    panic::resume_unwind(payload);
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names() {
        let factory = NamedThreadFactory::new("pool");
        let first = factory
            .spawn(None, Box::new(|| {}))
            .unwrap();
        let second = factory
            .spawn(None, Box::new(|| {}))
            .unwrap();

        assert_eq!(first.thread().name(), Some("pool-1"));
        assert_eq!(second.thread().name(), Some("pool-2"));
        first.join().unwrap();
        second.join().unwrap();
        assert_eq!(factory.spawned(), 2);
    }

    #[test]
    fn test_explicit_name_wins() {
        let factory = NamedThreadFactory::default();
        let handle = factory
            .spawn(
                Some("custom".to_string()),
                Box::new(|| assert_eq!(thread::current().name(), Some("custom"))),
            )
            .unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_panic_reaches_join_handle() {
        let factory = NamedThreadFactory::new("boom");
        let handle = factory
            .spawn(None, Box::new(|| panic!("job failed")))
            .unwrap();
        let payload = handle.join().unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "job failed");
    }
}
