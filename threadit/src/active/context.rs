use std::time::{Duration, Instant};

use tracing::debug;

use super::ActiveObjectRef;
use crate::config::ActiveObjectConfig;
use crate::work::{Payload, WorkId, WorkItem};

/// Per-invocation context handed to every handler.
///
/// Gives a handler access to its own active object and to the advisory
/// time budget of the item being processed. Handlers are never
/// interrupted; long-running ones should poll
/// [`has_time_remaining`](Self::has_time_remaining) and give up (typically
/// with [`WorkStatus::Timeout`](crate::WorkStatus::Timeout)) when it
/// returns `false`.
pub struct WorkContext<'a> {
    handle: &'a ActiveObjectRef,
    started_at: Instant,
    time_budget: Duration,
}

impl<'a> WorkContext<'a> {
    pub(crate) fn new(handle: &'a ActiveObjectRef, time_budget: Duration) -> Self {
        Self {
            handle,
            started_at: Instant::now(),
            time_budget,
        }
    }

    /// Handle to the active object running this handler.
    pub fn handle(&self) -> &ActiveObjectRef {
        self.handle
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Time spent in this invocation so far.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Budget of the item being processed. Zero means unlimited.
    pub fn time_budget(&self) -> Duration {
        self.time_budget
    }

    /// Whether the invocation is still within its time budget.
    pub fn has_time_remaining(&self) -> bool {
        self.time_budget.is_zero() || self.elapsed() < self.time_budget
    }

    /// Changes this object's periodic interval. Zero disables ticking.
    pub fn set_period(&self, period: Duration) {
        self.handle
            .apply_period(ActiveObjectConfig::normalize_period(period));
    }

    pub fn period(&self) -> Option<Duration> {
        self.handle.period()
    }

    /// Delivers an extra result now, for handlers that produce more than
    /// one response per item. The item's own delivery policy applies.
    pub fn send_response(&self, result: WorkItem) -> bool {
        self.handle.send_response(result)
    }

    /// Sends a reply for `work` to the object and instruction recorded in
    /// its reply target.
    ///
    /// Returns `None` without side effects if `work` has no reply target or
    /// the target no longer exists.
    pub fn reply(&self, work: &WorkItem, payload: Option<Payload>) -> Option<WorkId> {
        let target = work.reply_to()?;
        let Some(destination) = target.target.upgrade() else {
            debug!(
                active_object = %self.name(),
                work_id = work.id(),
                "Reply target no longer exists"
            );
            return None;
        };

        let mut reply = WorkItem::new(target.instruction);
        reply.set_payload(payload);
        reply.set_reply_to(None);
        Some(destination.submit(reply))
    }

    /// Requests that this object stop once the current handler returns.
    pub fn stop(&self) {
        self.handle.stop();
    }
}
