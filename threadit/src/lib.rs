// ThreadIt Active Object Framework
//
// This crate provides active objects: each one owns a dedicated thread,
// accepts work items through a blocking queue, runs them one at a time on
// that thread and hands results back through a done queue or a callback.
// The synchronisation primitives the runtime is built from (blocking queue,
// semaphore, re-entrant critical section, multi-signal wait) are exported
// for standalone use.

pub mod active;
pub mod config;
pub mod error;
pub mod logging;
pub mod message;
pub mod observer;
pub mod queue;
pub mod spawn;
pub mod sync;
pub mod targets;
pub mod timer;
pub mod work;

// Re-export commonly used types
pub use active::{
    ActiveObject, ActiveObjectBuilder, ActiveObjectRef, Handler, HandlerResult, LifecycleState,
    WeakActiveObjectRef, WorkContext,
};
pub use config::{ActiveObjectConfig, DEFAULT_PERIOD, MAX_WORK_METHODS};
pub use error::{RegistrationError, ShutdownError, SpawnError};
pub use message::Message;
pub use observer::{Notifier, Observer};
pub use queue::BlockingQueue;
pub use spawn::{NamedThreadFactory, ThreadFactory};
pub use sync::{CriticalSection, Semaphore, Signal, SignalQueue, WaitForObjects, WaitResult};
pub use targets::{WorkTarget, WorkTargets};
pub use timer::Timer;
pub use work::{
    ChannelCallback, DoneQueue, Instruction, ParamCheck, Payload, PayloadValue, QueueDelivery,
    ReplyTarget, ResultDelivery, WorkDone, WorkDoneCallback, WorkId, WorkItem, WorkStatus,
};
