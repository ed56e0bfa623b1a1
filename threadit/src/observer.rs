//! # Observers
//!
//! A lightweight publish/subscribe layer over active objects. An
//! [`Observer`] names an active object and the instruction it wants to be
//! notified on; a [`Notifier`] keeps a list of observers and sends each of
//! them a no-reply message on every broadcast.
//!
//! Observers hold their targets weakly. Notifying an observer whose target
//! has gone away does nothing and reports `false`.

use parking_lot::Mutex;
use tracing::trace;

use crate::active::{ActiveObjectRef, WeakActiveObjectRef};
use crate::message::Message;
use crate::work::{Instruction, Payload};

/// Subscription of one active object to notifications on one instruction.
#[derive(Clone, Debug)]
pub struct Observer {
    target: WeakActiveObjectRef,
    instruction: Instruction,
    source: Option<WeakActiveObjectRef>,
}

impl Observer {
    pub fn new(target: &ActiveObjectRef, instruction: Instruction) -> Self {
        Self::from_weak(target.downgrade(), instruction)
    }

    pub fn from_weak(target: WeakActiveObjectRef, instruction: Instruction) -> Self {
        Self {
            target,
            instruction,
            source: None,
        }
    }

    /// Records the object on whose behalf notifications are sent. It
    /// appears as the reply target of every notification.
    pub fn with_source(mut self, source: &ActiveObjectRef) -> Self {
        self.source = Some(source.downgrade());
        self
    }

    pub fn target(&self) -> Option<ActiveObjectRef> {
        self.target.upgrade()
    }

    pub fn instruction(&self) -> Instruction {
        self.instruction
    }

    /// Whether the target still exists.
    pub fn is_valid(&self) -> bool {
        self.target.is_alive()
    }

    /// Whether both observers watch the same live object.
    pub fn same_target(&self, other: &Observer) -> bool {
        self.is_valid() && self.target.ptr_eq(&other.target)
    }

    /// Notifies the target on the observer's instruction.
    pub fn notify(&self) -> bool {
        self.send(self.instruction, None)
    }

    /// Notifies the target on the observer's instruction with `payload`.
    pub fn notify_with(&self, payload: Payload) -> bool {
        self.send(self.instruction, Some(payload))
    }

    /// Notifies the target on a different instruction.
    pub fn notify_on(&self, instruction: Instruction, payload: Option<Payload>) -> bool {
        self.send(instruction, payload)
    }

    fn send(&self, instruction: Instruction, payload: Option<Payload>) -> bool {
        let Some(target) = self.target.upgrade() else {
            trace!(instruction, "Observer target no longer exists");
            return false;
        };
        let mut message = Message::new(instruction);
        message.work_mut().set_payload(payload);
        if let Some(source) = &self.source {
            message.set_source_weak(source.clone(), 0);
        }
        message.send_with_no_reply_to(&target);
        true
    }
}

/// A set of observers notified together.
///
/// Safe to share between threads; every method takes `&self`.
#[derive(Debug, Default)]
pub struct Notifier {
    observers: Mutex<Vec<Observer>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `observer` unless one with the same live target and
    /// instruction is already attached. Returns whether it was added.
    pub fn attach(&self, observer: Observer) -> bool {
        let mut observers = self.observers.lock();
        let duplicate = observers
            .iter()
            .any(|o| o.same_target(&observer) && o.instruction == observer.instruction);
        if duplicate {
            return false;
        }
        observers.push(observer);
        true
    }

    /// Removes every observer with the same target and instruction as
    /// `observer`. Returns how many were removed.
    pub fn detach(&self, observer: &Observer) -> usize {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|o| {
            !(o.target.ptr_eq(&observer.target) && o.instruction == observer.instruction)
        });
        before - observers.len()
    }

    /// Drops observers whose targets no longer exist. Returns how many were
    /// dropped.
    pub fn clean_expired(&self) -> usize {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(Observer::is_valid);
        before - observers.len()
    }

    /// Removes all observers.
    pub fn clear(&self) {
        self.observers.lock().clear();
    }

    /// Notifies every observer. Returns how many targets were reached.
    pub fn notify_all(&self) -> usize {
        self.broadcast(None)
    }

    /// Notifies every observer with a shared `payload`.
    pub fn notify_all_with(&self, payload: Payload) -> usize {
        self.broadcast(Some(payload))
    }

    pub fn len(&self) -> usize {
        self.observers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.lock().is_empty()
    }

    fn broadcast(&self, payload: Option<Payload>) -> usize {
        // Snapshot so sends happen without holding the lock.
        let observers = self.observers.lock().clone();
        observers
            .iter()
            .filter(|o| match &payload {
                Some(payload) => o.notify_with(payload.clone()),
                None => o.notify(),
            })
            .count()
    }
}
