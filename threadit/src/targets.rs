use std::collections::HashMap;

use tracing::trace;

use crate::active::{ActiveObjectRef, WeakActiveObjectRef};
use crate::config::MAX_WORK_METHODS;
use crate::error::RegistrationError;
use crate::message::Message;
use crate::work::{Instruction, Payload, WorkId};

/// Where work selected by one instruction is forwarded to.
#[derive(Clone, Debug)]
pub struct WorkTarget {
    pub destination: WeakActiveObjectRef,
    pub instruction: Instruction,
}

impl WorkTarget {
    pub fn new(destination: &ActiveObjectRef, instruction: Instruction) -> Self {
        Self {
            destination: destination.downgrade(),
            instruction,
        }
    }
}

/// Routing table from a selector instruction to a [`WorkTarget`].
///
/// Lets an active object forward work without knowing its peers at
/// compile time: the host wires selector instructions to destinations,
/// and handlers call [`forward`](Self::forward).
#[derive(Clone, Debug, Default)]
pub struct WorkTargets {
    targets: HashMap<Instruction, WorkTarget>,
}

impl WorkTargets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `selector` to `instruction` on `destination`, replacing any
    /// existing route for `selector`.
    ///
    /// # Errors
    /// Both instructions must be below [`MAX_WORK_METHODS`].
    pub fn set(
        &mut self,
        selector: Instruction,
        destination: &ActiveObjectRef,
        instruction: Instruction,
    ) -> Result<(), RegistrationError> {
        self.set_target(selector, WorkTarget::new(destination, instruction))
    }

    pub fn set_target(
        &mut self,
        selector: Instruction,
        target: WorkTarget,
    ) -> Result<(), RegistrationError> {
        for instruction in [selector, target.instruction] {
            if instruction >= MAX_WORK_METHODS {
                return Err(RegistrationError::InstructionOutOfRange {
                    instruction,
                    max: MAX_WORK_METHODS,
                });
            }
        }
        self.targets.insert(selector, target);
        Ok(())
    }

    pub fn get(&self, selector: Instruction) -> Option<&WorkTarget> {
        self.targets.get(&selector)
    }

    pub fn remove(&mut self, selector: Instruction) -> Option<WorkTarget> {
        self.targets.remove(&selector)
    }

    /// Adds every route of `other`; routes in `other` win on conflict.
    pub fn merge(&mut self, other: &WorkTargets) {
        self.targets
            .extend(other.targets.iter().map(|(k, v)| (*k, v.clone())));
    }

    /// Makes this table a copy of `other`.
    pub fn replace_with(&mut self, other: &WorkTargets) {
        self.targets.clone_from(&other.targets);
    }

    /// Removes every route.
    pub fn reset(&mut self) {
        self.targets.clear();
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Sends `payload` along the route for `selector` without requesting a
    /// reply.
    ///
    /// Returns `None` if there is no route or the destination is gone.
    pub fn forward(&self, selector: Instruction, payload: Option<Payload>) -> Option<WorkId> {
        let target = self.targets.get(&selector)?;
        let Some(destination) = target.destination.upgrade() else {
            trace!(selector, "Work target no longer exists");
            return None;
        };
        let mut message = Message::new(target.instruction);
        message.work_mut().set_payload(payload);
        Some(message.send_with_no_reply_to(&destination))
    }
}

impl std::ops::Add<&WorkTargets> for &WorkTargets {
    type Output = WorkTargets;

    fn add(self, rhs: &WorkTargets) -> WorkTargets {
        let mut merged = self.clone();
        merged.merge(rhs);
        merged
    }
}
