//! # Work Items
//!
//! The values exchanged with an active object: the [`WorkItem`] itself, its
//! [`WorkStatus`] outcome codes, type-erased [`Payload`]s, the
//! [`ResultDelivery`] policy and the [`WorkDoneCallback`] notification hook.

pub mod callback;
pub mod item;
pub mod params;
pub mod payload;
pub mod status;

pub use callback::{ChannelCallback, WorkDone, WorkDoneCallback};
pub use item::{
    DoneQueue, Instruction, QueueDelivery, ReplyTarget, ResultDelivery, WorkId, WorkItem,
};
pub use params::ParamCheck;
pub use payload::{Payload, PayloadValue};
pub use status::WorkStatus;
