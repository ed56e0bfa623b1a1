//! # Active Object Handles
//!
//! [`ActiveObjectRef`] is the cloneable, thread-safe face of a running
//! active object. It shares the object's queues and control state with the
//! object's own thread; the handler table and user state never leave that
//! thread. [`WeakActiveObjectRef`] is the non-owning counterpart used for
//! reply routing and observers, so a link between two objects never keeps
//! either of them alive.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, trace, warn};
use uuid::Uuid;

use crate::config::ActiveObjectConfig;
use crate::error::panic_message;
use crate::queue::BlockingQueue;
use crate::sync::Semaphore;
use crate::timer::Timer;
use crate::work::{
    DoneQueue, Instruction, Payload, QueueDelivery, WorkDoneCallback, WorkId, WorkItem, WorkStatus,
};

/// Lifecycle of an active object's thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// The thread has been requested but has not started its loop.
    Created,
    /// The loop is processing work.
    Running,
    /// `stop` was called; the loop exits at its next wake-up.
    StopRequested,
    /// The loop has exited.
    Stopped,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::Created,
            1 => LifecycleState::Running,
            2 => LifecycleState::StopRequested,
            _ => LifecycleState::Stopped,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Created => "created",
            LifecycleState::Running => "running",
            LifecycleState::StopRequested => "stop requested",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

struct PeriodState {
    period: Option<Duration>,
    timer: Timer,
}

/// State shared between an active object's thread and its handles.
pub(crate) struct Core {
    name: String,
    id: Uuid,
    work_queue: Arc<BlockingQueue<WorkItem>>,
    done_queue: DoneQueue,
    exit: AtomicBool,
    state: AtomicU8,
    exit_signal: Semaphore,
    next_id: AtomicU64,
    period: Mutex<PeriodState>,
    periodic_callback: Mutex<Option<Arc<dyn WorkDoneCallback>>>,
}

impl Core {
    pub(crate) fn new(
        config: &ActiveObjectConfig,
        periodic_callback: Option<Arc<dyn WorkDoneCallback>>,
    ) -> Self {
        Self {
            name: config.name.clone(),
            id: Uuid::new_v4(),
            work_queue: Arc::new(BlockingQueue::new()),
            done_queue: Arc::new(BlockingQueue::new()),
            exit: AtomicBool::new(false),
            state: AtomicU8::new(LifecycleState::Created as u8),
            exit_signal: Semaphore::new(0),
            next_id: AtomicU64::new(1),
            period: Mutex::new(PeriodState {
                period: config.period.filter(|p| !p.is_zero()),
                timer: Timer::new(),
            }),
            periodic_callback: Mutex::new(periodic_callback),
        }
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Shared handle to a running active object.
///
/// Handles are cheap to clone and can be used from any thread. Equality is
/// identity: two handles are equal when they refer to the same object.
#[derive(Clone)]
pub struct ActiveObjectRef {
    core: Arc<Core>,
}

impl fmt::Debug for ActiveObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveObjectRef")
            .field("name", &self.core.name)
            .field("id", &self.core.id)
            .field("state", &self.state())
            .finish()
    }
}

impl PartialEq for ActiveObjectRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl Eq for ActiveObjectRef {}

impl ActiveObjectRef {
    pub(crate) fn from_core(core: Arc<Core>) -> Self {
        Self { core }
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Identifier of this instance, also recorded on its log span.
    pub fn id(&self) -> Uuid {
        self.core.id
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.core.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    pub fn downgrade(&self) -> WeakActiveObjectRef {
        WeakActiveObjectRef {
            core: Arc::downgrade(&self.core),
        }
    }

    // --- Work submission ---

    /// Queues `item` for processing and returns the id assigned to it.
    ///
    /// Items marked as events are queued ahead of normal work. Once
    /// [`stop`](Self::stop) has been called nothing more is processed: the
    /// item is still queued and given an id, but it stays in the work queue
    /// and a warning is logged.
    pub fn submit(&self, mut item: WorkItem) -> WorkId {
        let id = self.core.next_id.fetch_add(1, Ordering::Relaxed);
        item.set_id(id);
        if self.is_stop_requested() {
            warn!(
                active_object = %self.core.name,
                work_id = id,
                instruction = item.instruction(),
                "Work submitted after stop will not be processed"
            );
        }
        trace!(
            active_object = %self.core.name,
            work_id = id,
            instruction = item.instruction(),
            event = item.is_event(),
            "Work submitted"
        );
        if item.is_event() {
            self.core.work_queue.push_front(item);
        } else {
            self.core.work_queue.push_back(item);
        }
        id
    }

    /// Queues an event for `instruction` ahead of all waiting normal work.
    ///
    /// An event does not interrupt a handler that is already running.
    pub fn notify_event(&self, instruction: Instruction, payload: Option<Payload>) -> WorkId {
        let mut item = WorkItem::event(instruction);
        item.set_payload(payload);
        self.submit(item)
    }

    /// Submits `item` as an event on `instruction`, keeping its payload and
    /// delivery settings.
    pub fn notify_event_with(&self, instruction: Instruction, mut item: WorkItem) -> WorkId {
        item.set_instruction(instruction);
        item.set_event(true);
        self.submit(item)
    }

    /// Takes the next result from the done queue, waiting up to `timeout`.
    ///
    /// `None` means no result arrived in time, which is indistinguishable
    /// from work still being processed.
    pub fn await_result(&self, timeout: Duration) -> Option<WorkItem> {
        self.core.done_queue.poll(timeout)
    }

    pub fn work_queue(&self) -> &Arc<BlockingQueue<WorkItem>> {
        &self.core.work_queue
    }

    pub fn done_queue(&self) -> &DoneQueue {
        &self.core.done_queue
    }

    // --- Lifecycle ---

    /// Asks the loop to exit.
    ///
    /// A handler that is running finishes normally; queued work that has
    /// not started is left unprocessed. Repeated calls have no further
    /// effect.
    pub fn stop(&self) {
        if self.core.exit.swap(true, Ordering::AcqRel) {
            return;
        }
        if !self
            .core
            .transition(LifecycleState::Running, LifecycleState::StopRequested)
        {
            self.core
                .transition(LifecycleState::Created, LifecycleState::StopRequested);
        }
        crate::log_lifecycle!(self.core.name, "stop_requested");
        self.wake();
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stop_requested(&self) -> bool {
        self.core.exit.load(Ordering::Acquire)
    }

    /// Waits up to `timeout` for the loop to exit. Every caller sees the
    /// exit, not just the first.
    pub fn wait_for_stop(&self, timeout: Duration) -> bool {
        if self.core.exit_signal.try_acquire_for(timeout) {
            self.core.exit_signal.release();
            true
        } else {
            false
        }
    }

    // --- Periodic processing ---

    /// Changes the periodic interval. Zero disables periodic ticks. A
    /// changed period restarts the interval at once.
    pub fn set_period(&self, period: Duration) {
        if self.apply_period(ActiveObjectConfig::normalize_period(period)) {
            self.wake();
        }
    }

    /// The periodic interval, `None` when ticking is disabled.
    pub fn period(&self) -> Option<Duration> {
        self.core.period.lock().period
    }

    /// Sets the callback notified with each periodic result. `None` makes
    /// periodic results silent.
    pub fn set_periodic_callback(&self, callback: Option<Arc<dyn WorkDoneCallback>>) {
        *self.core.periodic_callback.lock() = callback;
    }

    pub fn periodic_callback(&self) -> Option<Arc<dyn WorkDoneCallback>> {
        self.core.periodic_callback.lock().clone()
    }

    // --- Crate internals used by the loop ---

    pub(crate) fn apply_period(&self, period: Option<Duration>) -> bool {
        let mut state = self.core.period.lock();
        if state.period == period {
            return false;
        }
        state.period = period;
        match period {
            Some(interval) => {
                state.timer.start(interval);
            }
            None => state.timer.reset(),
        }
        true
    }

    pub(crate) fn restart_period_timer(&self) {
        let mut state = self.core.period.lock();
        if let Some(interval) = state.period {
            state.timer.start(interval);
        }
    }

    /// Time until the next periodic tick, `None` when ticking is disabled.
    pub(crate) fn time_to_next_tick(&self) -> Option<Duration> {
        let state = self.core.period.lock();
        state.period.map(|_| state.timer.remaining())
    }

    pub(crate) fn periodic_due(&self) -> bool {
        let state = self.core.period.lock();
        state.period.is_some() && state.timer.is_expired()
    }

    pub(crate) fn next_id(&self) -> WorkId {
        self.core.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn mark_running(&self) -> bool {
        self.core
            .transition(LifecycleState::Created, LifecycleState::Running)
    }

    pub(crate) fn mark_stopped(&self) {
        self.core
            .state
            .store(LifecycleState::Stopped as u8, Ordering::Release);
        self.core.exit_signal.release();
    }

    fn wake(&self) {
        self.core.work_queue.push_back(WorkItem::wake());
    }

    /// Delivers a completed item according to its delivery policy.
    ///
    /// Queue delivery and callback notification are attempted
    /// independently. Returns `false` if either failed.
    pub(crate) fn send_response(&self, mut result: WorkItem) -> bool {
        result.set_source(self.downgrade());
        let work_id = result.id();
        let callback = result.delivery().callback.clone();
        let mut delivered = true;

        match result.delivery().queue.clone() {
            QueueDelivery::None => {}
            QueueDelivery::Default => self.core.done_queue.push_back(result),
            QueueDelivery::Custom(queue) => match queue.upgrade() {
                Some(queue) => queue.push_back(result),
                None => {
                    result.set_status(WorkStatus::InvalidDoneQueue);
                    error!(
                        active_object = %self.core.name,
                        work_id,
                        instruction = result.instruction(),
                        "Result dropped: requested done queue no longer exists"
                    );
                    delivered = false;
                }
            },
        }

        if let Some(callback) = callback {
            let name = self.core.name.as_str();
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| callback.on_work_done(name, work_id)));
            if let Err(payload) = outcome {
                warn!(
                    active_object = %name,
                    work_id,
                    panic = %panic_message(payload.as_ref()),
                    "Work-done callback panicked"
                );
                delivered = false;
            }
        }

        delivered
    }
}

/// Non-owning handle to an active object.
///
/// Upgrading fails once the object's thread has exited and every
/// [`ActiveObjectRef`] has been dropped; callers treat that as a silent
/// no-op.
#[derive(Clone, Default)]
pub struct WeakActiveObjectRef {
    core: Weak<Core>,
}

impl fmt::Debug for WeakActiveObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(target) => f
                .debug_tuple("WeakActiveObjectRef")
                .field(&target.name())
                .finish(),
            None => f.write_str("WeakActiveObjectRef(<dead>)"),
        }
    }
}

impl WeakActiveObjectRef {
    /// A handle that never upgrades.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upgrade(&self) -> Option<ActiveObjectRef> {
        self.core.upgrade().map(ActiveObjectRef::from_core)
    }

    pub fn is_alive(&self) -> bool {
        self.core.strong_count() > 0
    }

    /// Whether both handles refer to the same object.
    pub fn ptr_eq(&self, other: &WeakActiveObjectRef) -> bool {
        Weak::ptr_eq(&self.core, &other.core)
    }
}
