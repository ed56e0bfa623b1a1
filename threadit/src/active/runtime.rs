//! # Active Object Loop
//!
//! The body of an active object's dedicated thread. One iteration:
//!
//! 1. Wait on the work queue for at most the time left until the next
//!    periodic tick (without limit when there is no periodic handler or the
//!    period is disabled).
//! 2. Dispatch whatever arrived to the handler registered for its
//!    instruction and route the result.
//! 3. Run the periodic handler if its interval has expired, whether or not
//!    work arrived, and restart the interval.
//!
//! The thread must survive anything a handler does: errors and panics are
//! turned into [`WorkStatus::Failed`] results.

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error};

use super::{ActiveObjectRef, Handler, WorkContext};
use crate::error::panic_message;
use crate::work::{ResultDelivery, WorkItem, WorkStatus};
use crate::{active_object_span, log_lifecycle, log_work};

pub(crate) struct Runtime<S> {
    pub(crate) handle: ActiveObjectRef,
    pub(crate) state: S,
    pub(crate) handlers: Vec<Option<Handler<S>>>,
    pub(crate) periodic: Option<Handler<S>>,
    pub(crate) state_tx: flume::Sender<S>,
}

impl<S: Send + 'static> Runtime<S> {
    pub(crate) fn run(mut self) {
        let span = active_object_span!(self.handle.name(), self.handle.id());
        let _entered = span.enter();

        if self.handle.mark_running() {
            log_lifecycle!(self.handle.name(), "started", period = ?self.handle.period());
        }
        self.handle.restart_period_timer();

        while !self.handle.is_stop_requested() {
            let next = match self.wait_timeout() {
                Some(timeout) => self.handle.work_queue().poll(timeout),
                None => Some(self.handle.work_queue().take()),
            };
            if self.handle.is_stop_requested() {
                break;
            }

            if let Some(item) = next {
                if !item.is_wake() {
                    self.process(item);
                }
            }

            if !self.handle.is_stop_requested() {
                self.run_periodic_if_due();
            }
        }

        let Runtime {
            handle,
            state,
            state_tx,
            ..
        } = self;
        // The owner may already be gone; then nobody wants the state back.
        let _ = state_tx.send(state);
        handle.mark_stopped();
        log_lifecycle!(handle.name(), "stopped");
    }

    fn wait_timeout(&self) -> Option<std::time::Duration> {
        if self.periodic.is_none() {
            return None;
        }
        self.handle.time_to_next_tick()
    }

    fn process(&mut self, item: WorkItem) {
        let instruction = item.instruction();
        let mut ctx = WorkContext::new(&self.handle, item.time_budget());

        let mut result = match self.handlers.get_mut(instruction as usize) {
            None => {
                error!(instruction, work_id = item.id(), "Invalid work instruction");
                item.clone().with_status(WorkStatus::InvalidInstruction)
            }
            Some(None) => {
                error!(
                    instruction,
                    work_id = item.id(),
                    "No handler registered for work instruction"
                );
                item.clone().with_status(WorkStatus::NoMethod)
            }
            Some(Some(handler)) => invoke(handler, &mut self.state, &mut ctx, &item),
        };
        result.set_elapsed(ctx.elapsed());

        log_work!(instruction, result.status(), work_id = result.id(), event = item.is_event());
        self.handle.send_response(result);
    }

    fn run_periodic_if_due(&mut self) {
        let Some(handler) = self.periodic.as_mut() else {
            return;
        };
        if !self.handle.periodic_due() {
            return;
        }

        let delivery = match self.handle.periodic_callback() {
            Some(callback) => ResultDelivery::callback_only(callback),
            None => ResultDelivery::none(),
        };
        let mut tick = WorkItem::new(0)
            .with_delivery(delivery)
            .with_time_budget(self.handle.period().unwrap_or_default());
        tick.set_id(self.handle.next_id());

        let mut ctx = WorkContext::new(&self.handle, tick.time_budget());
        let mut result = invoke(handler, &mut self.state, &mut ctx, &tick);
        result.set_elapsed(ctx.elapsed());
        debug!(work_id = result.id(), status = %result.status(), "Periodic tick");

        self.handle.send_response(result);
        self.handle.restart_period_timer();
    }
}

/// Runs one handler, converting every way it can fail into a status.
fn invoke<S>(
    handler: &mut Handler<S>,
    state: &mut S,
    ctx: &mut WorkContext<'_>,
    item: &WorkItem,
) -> WorkItem {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(state, ctx, item)));
    match outcome {
        Ok(Ok(Some(mut result))) => {
            if result.status() == WorkStatus::Pending {
                result.set_status(WorkStatus::Ok);
            }
            result
        }
        Ok(Ok(None)) => item.clone().with_status(WorkStatus::NoResult),
        Ok(Err(err)) => {
            error!(
                instruction = item.instruction(),
                work_id = item.id(),
                error = %err,
                "Handler returned an error"
            );
            item.clone().with_status(WorkStatus::Failed)
        }
        Err(payload) => {
            error!(
                instruction = item.instruction(),
                work_id = item.id(),
                panic = %panic_message(payload.as_ref()),
                "Handler panicked"
            );
            item.clone().with_status(WorkStatus::Failed)
        }
    }
}
