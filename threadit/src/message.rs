use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::active::{ActiveObjectRef, WeakActiveObjectRef};
use crate::work::{
    Instruction, Payload, PayloadValue, QueueDelivery, ReplyTarget, WorkDoneCallback, WorkId,
    WorkItem,
};

/// Builds and sends work items.
///
/// A message is a reusable template: an instruction, an optional
/// completion callback, an optional reply source and a work item carrying
/// the payload. Each send stamps the template's settings onto a copy of the
/// work item and submits it.
///
/// The reply source is held weakly, so a destination holding the message
/// never keeps the sender alive.
#[derive(Clone)]
pub struct Message {
    work: WorkItem,
    instruction: Instruction,
    callback: Option<Arc<dyn WorkDoneCallback>>,
    source: Option<WeakActiveObjectRef>,
    reply_instruction: Instruction,
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("instruction", &self.instruction)
            .field("work", &self.work)
            .field("callback", &self.callback.is_some())
            .field("source", &self.source)
            .field("reply_instruction", &self.reply_instruction)
            .finish()
    }
}

impl Message {
    pub fn new(instruction: Instruction) -> Self {
        Self {
            work: WorkItem::new(instruction),
            instruction,
            callback: None,
            source: None,
            reply_instruction: 0,
        }
    }

    /// A message whose sends with reply also notify `callback`.
    pub fn with_callback(instruction: Instruction, callback: Arc<dyn WorkDoneCallback>) -> Self {
        let mut message = Self::new(instruction);
        message.callback = Some(callback);
        message
    }

    pub fn with_payload<T: PayloadValue>(mut self, value: T) -> Self {
        self.work.set_payload(Some(Payload::new(value)));
        self
    }

    /// The work item template.
    pub fn work(&self) -> &WorkItem {
        &self.work
    }

    pub fn work_mut(&mut self) -> &mut WorkItem {
        &mut self.work
    }

    pub fn instruction(&self) -> Instruction {
        self.instruction
    }

    pub fn set_instruction(&mut self, instruction: Instruction) {
        self.instruction = instruction;
    }

    pub fn set_callback(&mut self, callback: Option<Arc<dyn WorkDoneCallback>>) {
        self.callback = callback;
    }

    /// Asks the destination to reply to `source` on `reply_instruction`.
    pub fn set_source(&mut self, source: &ActiveObjectRef, reply_instruction: Instruction) {
        self.set_source_weak(source.downgrade(), reply_instruction);
    }

    pub fn set_source_weak(&mut self, source: WeakActiveObjectRef, reply_instruction: Instruction) {
        self.source = Some(source);
        self.reply_instruction = reply_instruction;
    }

    /// Sends with the result delivered to the destination's done queue (or
    /// the template's custom queue) and to the callback, if any.
    pub fn send_to(&self, destination: &ActiveObjectRef) -> WorkId {
        destination.submit(self.prepare(true))
    }

    /// Sends without any result delivery.
    pub fn send_with_no_reply_to(&self, destination: &ActiveObjectRef) -> WorkId {
        destination.submit(self.prepare(false))
    }

    /// [`send_to`](Self::send_to) on `instruction`, which also becomes the
    /// message's instruction for later sends.
    pub fn send_to_with(
        &mut self,
        destination: &ActiveObjectRef,
        instruction: Instruction,
    ) -> WorkId {
        self.instruction = instruction;
        self.send_to(destination)
    }

    /// [`send_with_no_reply_to`](Self::send_with_no_reply_to) on
    /// `instruction`, which also becomes the message's instruction.
    pub fn send_with_no_reply_to_with(
        &mut self,
        destination: &ActiveObjectRef,
        instruction: Instruction,
    ) -> WorkId {
        self.instruction = instruction;
        self.send_with_no_reply_to(destination)
    }

    /// [`send_to`](Self::send_to) a destination that may no longer exist.
    /// Returns `None` if it is gone.
    pub fn send_to_weak(&self, destination: &WeakActiveObjectRef) -> Option<WorkId> {
        match destination.upgrade() {
            Some(destination) => Some(self.send_to(&destination)),
            None => {
                debug!(instruction = self.instruction, "Message destination no longer exists");
                None
            }
        }
    }

    /// [`send_with_no_reply_to`](Self::send_with_no_reply_to) a destination
    /// that may no longer exist.
    pub fn send_with_no_reply_to_weak(&self, destination: &WeakActiveObjectRef) -> Option<WorkId> {
        let destination = destination.upgrade()?;
        Some(self.send_with_no_reply_to(&destination))
    }

    fn prepare(&self, with_reply: bool) -> WorkItem {
        let mut item = self.work.clone();
        item.set_instruction(self.instruction);
        item.set_reply_to(self.source.clone().map(|target| ReplyTarget {
            target,
            instruction: self.reply_instruction,
        }));

        let delivery = item.delivery_mut();
        if with_reply {
            if matches!(delivery.queue, QueueDelivery::None) {
                delivery.queue = QueueDelivery::Default;
            }
            delivery.callback = self.callback.clone();
        } else {
            delivery.queue = QueueDelivery::None;
            delivery.callback = None;
        }
        item
    }
}
