use std::any::Any;
use std::fmt;
use std::sync::Arc;

use downcast_rs::{DowncastSync, impl_downcast};

/// Any value that can ride on a [`WorkItem`](super::WorkItem).
///
/// Implemented for every `Send + Sync + Debug` type with a `'static`
/// lifetime; there is nothing to implement by hand.
pub trait PayloadValue: DowncastSync + fmt::Debug {}
impl_downcast!(sync PayloadValue);

impl<T> PayloadValue for T where T: Any + Send + Sync + fmt::Debug {}

/// Shared, type-erased payload.
///
/// Cloning a payload clones the reference, not the value: a work item and
/// its echoed result point at the same payload.
#[derive(Clone)]
pub struct Payload(Arc<dyn PayloadValue>);

impl Payload {
    pub fn new<T: PayloadValue>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Wraps a value that is already shared.
    pub fn from_arc<T: PayloadValue>(value: Arc<T>) -> Self {
        Self(value)
    }

    /// Whether the payload holds a `T`.
    pub fn is<T: PayloadValue>(&self) -> bool {
        self.0.is::<T>()
    }

    pub fn downcast_ref<T: PayloadValue>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Shared handle to the value, if it is a `T`.
    pub fn downcast_arc<T: PayloadValue>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast_arc::<T>().ok()
    }

    /// Whether both payloads refer to the same value.
    pub fn ptr_eq(&self, other: &Payload) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}
