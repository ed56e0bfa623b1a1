use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::WorkId;

/// Receives a notification each time a work item with callback delivery
/// completes.
///
/// Runs on the active object's own thread, so implementations should hand
/// off quickly. A panic inside the callback is caught and logged.
pub trait WorkDoneCallback: Send + Sync {
    fn on_work_done(&self, thread_name: &str, work_id: WorkId);
}

impl<F> WorkDoneCallback for F
where
    F: Fn(&str, WorkId) + Send + Sync,
{
    fn on_work_done(&self, thread_name: &str, work_id: WorkId) {
        self(thread_name, work_id)
    }
}

/// A completed-work notification as delivered by [`ChannelCallback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDone {
    pub thread_name: String,
    pub work_id: WorkId,
}

/// Forwards completion notifications into a `flume` channel.
///
/// ```rust
/// use threadit::work::ChannelCallback;
///
/// let (callback, done) = ChannelCallback::unbounded();
/// // attach `callback` to work items, then:
/// // let notice = done.recv_timeout(timeout)?;
/// # drop((callback, done));
/// ```
#[derive(Clone)]
pub struct ChannelCallback {
    sender: flume::Sender<WorkDone>,
}

impl fmt::Debug for ChannelCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelCallback")
            .field("pending", &self.sender.len())
            .finish()
    }
}

impl ChannelCallback {
    pub fn new(sender: flume::Sender<WorkDone>) -> Self {
        Self { sender }
    }

    /// Creates a callback together with the receiving end of its channel.
    pub fn unbounded() -> (Arc<Self>, flume::Receiver<WorkDone>) {
        let (sender, receiver) = flume::unbounded();
        (Arc::new(Self::new(sender)), receiver)
    }
}

impl WorkDoneCallback for ChannelCallback {
    fn on_work_done(&self, thread_name: &str, work_id: WorkId) {
        let notice = WorkDone {
            thread_name: thread_name.to_string(),
            work_id,
        };
        if self.sender.send(notice).is_err() {
            debug!(thread_name, work_id, "Work-done receiver has gone away");
        }
    }
}
