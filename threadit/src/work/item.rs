use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::{Payload, PayloadValue, WorkDoneCallback, WorkStatus};
use crate::active::{ActiveObjectRef, WeakActiveObjectRef};
use crate::queue::BlockingQueue;

/// Selects the handler that processes a work item.
pub type Instruction = u32;

/// Identifier assigned to a work item when it is submitted. Unique per
/// active object, increasing, wrapping to 0.
pub type WorkId = u64;

/// Queue of completed work items.
pub type DoneQueue = Arc<BlockingQueue<WorkItem>>;

/// Where a completed item is queued.
#[derive(Clone, Default)]
pub enum QueueDelivery {
    /// Not queued anywhere.
    None,
    /// The processing active object's own done queue.
    #[default]
    Default,
    /// A caller-supplied queue. The item is not queued, and its status
    /// becomes [`WorkStatus::InvalidDoneQueue`], if the queue has been
    /// dropped by the time the result is ready.
    Custom(Weak<BlockingQueue<WorkItem>>),
}

impl fmt::Debug for QueueDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueDelivery::None => f.write_str("None"),
            QueueDelivery::Default => f.write_str("Default"),
            QueueDelivery::Custom(queue) => f
                .debug_tuple("Custom")
                .field(&(queue.strong_count() > 0))
                .finish(),
        }
    }
}

/// Result delivery policy of a work item.
///
/// Queue delivery and callback notification are independent; either, both
/// or neither may apply.
#[derive(Clone, Default)]
pub struct ResultDelivery {
    pub queue: QueueDelivery,
    pub callback: Option<Arc<dyn WorkDoneCallback>>,
}

impl fmt::Debug for ResultDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultDelivery")
            .field("queue", &self.queue)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl ResultDelivery {
    /// No queueing and no callback: the result is discarded.
    pub fn none() -> Self {
        Self {
            queue: QueueDelivery::None,
            callback: None,
        }
    }

    /// Queue on the processing object's done queue.
    pub fn default_queue() -> Self {
        Self::default()
    }

    /// Queue on `queue` instead of the default done queue.
    pub fn custom_queue(queue: &DoneQueue) -> Self {
        Self {
            queue: QueueDelivery::Custom(Arc::downgrade(queue)),
            callback: None,
        }
    }

    /// Notify through `callback` only; nothing is queued.
    pub fn callback_only(callback: Arc<dyn WorkDoneCallback>) -> Self {
        Self {
            queue: QueueDelivery::None,
            callback: Some(callback),
        }
    }

    pub fn with_callback(mut self, callback: Arc<dyn WorkDoneCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Whether completing the item has no visible effect.
    pub fn is_silent(&self) -> bool {
        matches!(self.queue, QueueDelivery::None) && self.callback.is_none()
    }
}

/// Active object and instruction that a reply should be sent to.
#[derive(Clone, Debug)]
pub struct ReplyTarget {
    pub target: WeakActiveObjectRef,
    pub instruction: Instruction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemKind {
    Normal,
    Event,
    /// Internal: unblocks the loop, never dispatched.
    Wake,
}

/// The unit of work exchanged with an active object.
///
/// Cloning copies every field; the payload is shared, not duplicated.
#[derive(Clone)]
pub struct WorkItem {
    instruction: Instruction,
    id: WorkId,
    payload: Option<Payload>,
    time_budget: Duration,
    elapsed: Duration,
    status: WorkStatus,
    delivery: ResultDelivery,
    reply_to: Option<ReplyTarget>,
    source: Option<WeakActiveObjectRef>,
    kind: ItemKind,
}

impl Default for WorkItem {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("instruction", &self.instruction)
            .field("id", &self.id)
            .field("status", &self.status)
            .field("payload", &self.payload)
            .field("time_budget", &self.time_budget)
            .field("elapsed", &self.elapsed)
            .field("delivery", &self.delivery)
            .field("reply_to", &self.reply_to.as_ref().map(|r| r.instruction))
            .field("kind", &self.kind)
            .finish()
    }
}

impl WorkItem {
    /// Creates a work item for `instruction` with default delivery (the
    /// processing object's done queue) and no payload.
    pub fn new(instruction: Instruction) -> Self {
        Self {
            instruction,
            id: 0,
            payload: None,
            time_budget: Duration::ZERO,
            elapsed: Duration::ZERO,
            status: WorkStatus::Pending,
            delivery: ResultDelivery::default(),
            reply_to: None,
            source: None,
            kind: ItemKind::Normal,
        }
    }

    /// Creates an event item. Submitted events are queued ahead of normal
    /// work.
    pub fn event(instruction: Instruction) -> Self {
        Self {
            kind: ItemKind::Event,
            ..Self::new(instruction)
        }
    }

    pub(crate) fn wake() -> Self {
        Self {
            delivery: ResultDelivery::none(),
            kind: ItemKind::Wake,
            ..Self::new(0)
        }
    }

    // --- Builder methods ---

    pub fn with_payload<T: PayloadValue>(mut self, value: T) -> Self {
        self.payload = Some(Payload::new(value));
        self
    }

    pub fn with_shared_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Sets the advisory time budget. Zero means unlimited.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn with_delivery(mut self, delivery: ResultDelivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Adds callback notification, keeping the queue policy.
    pub fn with_callback(mut self, callback: Arc<dyn WorkDoneCallback>) -> Self {
        self.delivery.callback = Some(callback);
        self
    }

    /// Queues the result on `queue` instead of the default done queue.
    pub fn with_done_queue(mut self, queue: &DoneQueue) -> Self {
        self.delivery.queue = QueueDelivery::Custom(Arc::downgrade(queue));
        self
    }

    /// Suppresses queue delivery of the result.
    pub fn without_queue_delivery(mut self) -> Self {
        self.delivery.queue = QueueDelivery::None;
        self
    }

    /// Asks the handler to reply to `target` on `instruction`.
    pub fn with_reply_to(mut self, target: &ActiveObjectRef, instruction: Instruction) -> Self {
        self.reply_to = Some(ReplyTarget {
            target: target.downgrade(),
            instruction,
        });
        self
    }

    pub fn with_status(mut self, status: WorkStatus) -> Self {
        self.status = status;
        self
    }

    // --- Accessors ---

    pub fn instruction(&self) -> Instruction {
        self.instruction
    }

    pub fn set_instruction(&mut self, instruction: Instruction) {
        self.instruction = instruction;
    }

    pub fn id(&self) -> WorkId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: WorkId) {
        self.id = id;
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// The payload as a `T`, if there is one of that type.
    pub fn payload_ref<T: PayloadValue>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }

    pub fn set_payload(&mut self, payload: Option<Payload>) {
        self.payload = payload;
    }

    pub fn take_payload(&mut self) -> Option<Payload> {
        self.payload.take()
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    pub fn time_budget(&self) -> Duration {
        self.time_budget
    }

    pub fn set_time_budget(&mut self, budget: Duration) {
        self.time_budget = budget;
    }

    /// Time the handler took, filled in by the active object.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub(crate) fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    pub fn status(&self) -> WorkStatus {
        self.status
    }

    pub fn set_status(&mut self, status: WorkStatus) {
        self.status = status;
    }

    pub fn delivery(&self) -> &ResultDelivery {
        &self.delivery
    }

    pub fn delivery_mut(&mut self) -> &mut ResultDelivery {
        &mut self.delivery
    }

    pub fn reply_to(&self) -> Option<&ReplyTarget> {
        self.reply_to.as_ref()
    }

    pub fn set_reply_to(&mut self, reply_to: Option<ReplyTarget>) {
        self.reply_to = reply_to;
    }

    /// The active object that produced this result. Set when the result is
    /// routed; `None` on items that have not been processed.
    pub fn source(&self) -> Option<ActiveObjectRef> {
        self.source.as_ref()?.upgrade()
    }

    pub(crate) fn set_source(&mut self, source: WeakActiveObjectRef) {
        self.source = Some(source);
    }

    pub fn is_event(&self) -> bool {
        self.kind == ItemKind::Event
    }

    pub fn set_event(&mut self, is_event: bool) {
        if self.kind != ItemKind::Wake {
            self.kind = if is_event { ItemKind::Event } else { ItemKind::Normal };
        }
    }

    pub(crate) fn is_wake(&self) -> bool {
        self.kind == ItemKind::Wake
    }
}
