use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::handle::Core;
use super::runtime::Runtime;
use super::{ActiveObject, ActiveObjectRef, Handler, HandlerResult, WorkContext};
use crate::config::{ActiveObjectConfig, MAX_WORK_METHODS};
use crate::error::{RegistrationError, SpawnError};
use crate::spawn::{NamedThreadFactory, ThreadFactory};
use crate::work::{Instruction, WorkDoneCallback, WorkItem};

/// Assembles an active object: its dispatch table, periodic handler and
/// settings, then starts its thread with [`spawn`](Self::spawn).
///
/// All handlers are registered here, before the thread exists, so the
/// dispatch table is never written while work is being dispatched.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use threadit::{ActiveObjectBuilder, WorkItem};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let echo = ActiveObjectBuilder::<()>::new("echo")
///     .handler(1, |_, _, item: &WorkItem| Ok(Some(item.clone())))?
///     .spawn(())?;
///
/// echo.submit(WorkItem::new(1).with_payload("hi"));
/// let result = echo.await_result(Duration::from_secs(1));
/// # let _ = result;
/// # Ok(())
/// # }
/// ```
pub struct ActiveObjectBuilder<S> {
    config: ActiveObjectConfig,
    handlers: Vec<Option<Handler<S>>>,
    periodic: Option<Handler<S>>,
    periodic_callback: Option<Arc<dyn WorkDoneCallback>>,
    thread_factory: Option<Arc<dyn ThreadFactory>>,
}

impl<S: Send + 'static> ActiveObjectBuilder<S> {
    /// Starts a builder with default settings and the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(ActiveObjectConfig::named(name))
    }

    pub fn with_config(config: ActiveObjectConfig) -> Self {
        Self {
            config,
            handlers: (0..MAX_WORK_METHODS).map(|_| None).collect(),
            periodic: None,
            periodic_callback: None,
            thread_factory: None,
        }
    }

    pub fn config(&self) -> &ActiveObjectConfig {
        &self.config
    }

    /// Sets the periodic interval. Zero disables periodic ticks.
    pub fn period(mut self, period: Duration) -> Self {
        self.config.period = ActiveObjectConfig::normalize_period(period);
        self
    }

    /// Prefix of the object's thread name. Empty names the thread after
    /// the object alone.
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Uses `factory` to create the object's thread instead of a
    /// [`NamedThreadFactory`].
    pub fn thread_factory(mut self, factory: Arc<dyn ThreadFactory>) -> Self {
        self.thread_factory = Some(factory);
        self
    }

    /// Callback notified with each periodic result.
    pub fn periodic_callback(mut self, callback: Arc<dyn WorkDoneCallback>) -> Self {
        self.periodic_callback = Some(callback);
        self
    }

    /// Binds `handler` to `instruction`, replacing any earlier binding.
    pub fn register_handler<F>(
        &mut self,
        instruction: Instruction,
        handler: F,
    ) -> Result<(), RegistrationError>
    where
        F: FnMut(&mut S, &mut WorkContext<'_>, &WorkItem) -> HandlerResult + Send + 'static,
    {
        let slot = self
            .handlers
            .get_mut(instruction as usize)
            .ok_or(RegistrationError::InstructionOutOfRange {
                instruction,
                max: MAX_WORK_METHODS,
            })?;
        if slot.is_some() {
            debug!(name = %self.config.name, instruction, "Replacing registered handler");
        }
        *slot = Some(Box::new(handler));
        Ok(())
    }

    /// Chaining form of [`register_handler`](Self::register_handler).
    pub fn handler<F>(
        mut self,
        instruction: Instruction,
        handler: F,
    ) -> Result<Self, RegistrationError>
    where
        F: FnMut(&mut S, &mut WorkContext<'_>, &WorkItem) -> HandlerResult + Send + 'static,
    {
        self.register_handler(instruction, handler)?;
        Ok(self)
    }

    /// Installs the periodic handler. It receives a fresh item on
    /// instruction 0 each time the period expires.
    pub fn register_periodic<F>(&mut self, handler: F)
    where
        F: FnMut(&mut S, &mut WorkContext<'_>, &WorkItem) -> HandlerResult + Send + 'static,
    {
        self.periodic = Some(Box::new(handler));
    }

    /// Chaining form of [`register_periodic`](Self::register_periodic).
    pub fn periodic<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&mut S, &mut WorkContext<'_>, &WorkItem) -> HandlerResult + Send + 'static,
    {
        self.register_periodic(handler);
        self
    }

    /// Whether `instruction` has a handler.
    pub fn is_registered(&self, instruction: Instruction) -> bool {
        matches!(self.handlers.get(instruction as usize), Some(Some(_)))
    }

    /// Starts the object's thread, moving `state` onto it.
    ///
    /// # Errors
    /// Returns [`SpawnError::Thread`] if the thread factory cannot start a
    /// thread.
    pub fn spawn(self, state: S) -> Result<ActiveObject<S>, SpawnError> {
        let core = Arc::new(Core::new(&self.config, self.periodic_callback));
        let handle = ActiveObjectRef::from_core(core);
        let (state_tx, state_rx) = flume::bounded(1);

        let runtime = Runtime {
            handle: handle.clone(),
            state,
            handlers: self.handlers,
            periodic: self.periodic,
            state_tx,
        };

        let factory = self.thread_factory.unwrap_or_else(|| {
            Arc::new(NamedThreadFactory::new(self.config.thread_name_prefix.clone()))
        });
        let thread = factory.spawn(
            Some(self.config.thread_name()),
            Box::new(move || runtime.run()),
        )?;

        Ok(ActiveObject::new(handle, thread, state_rx))
    }
}
