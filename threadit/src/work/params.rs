use std::sync::Arc;

use tracing::error;

use super::{PayloadValue, WorkItem, WorkStatus};

/// Result of checking a handler's input with
/// [`WorkItem::expect_payload`] or [`WorkItem::expect_no_payload`].
#[derive(Debug)]
pub struct ParamCheck<T> {
    /// The typed payload, when the check succeeded and one was expected.
    pub payload: Option<Arc<T>>,
    /// The item to return from the handler. A copy of the input when
    /// copying was requested, otherwise a blank item. Its status is the
    /// outcome of the check.
    pub work_done: WorkItem,
    /// `Ok`, `ParamObjectNull` or `PayloadNotExpected`.
    pub status: WorkStatus,
}

impl<T> ParamCheck<T> {
    pub fn is_ok(&self) -> bool {
        self.status == WorkStatus::Ok
    }
}

impl WorkItem {
    /// Checks that the item carries a payload of type `T`.
    ///
    /// On failure the status is [`WorkStatus::ParamObjectNull`] and the
    /// failure is logged.
    pub fn expect_payload<T: PayloadValue>(&self, copy: bool) -> ParamCheck<T> {
        let payload = self.payload().and_then(|p| p.downcast_arc::<T>());
        let status = if payload.is_some() {
            WorkStatus::Ok
        } else {
            WorkStatus::ParamObjectNull
        };
        self.param_check(payload, status, copy)
    }

    /// Checks that the item carries no payload.
    ///
    /// On failure the status is [`WorkStatus::PayloadNotExpected`] and the
    /// failure is logged.
    pub fn expect_no_payload(&self, copy: bool) -> ParamCheck<()> {
        let status = if self.has_payload() {
            WorkStatus::PayloadNotExpected
        } else {
            WorkStatus::Ok
        };
        self.param_check(None, status, copy)
    }

    fn param_check<T>(
        &self,
        payload: Option<Arc<T>>,
        status: WorkStatus,
        copy: bool,
    ) -> ParamCheck<T> {
        let mut work_done = if copy { self.clone() } else { WorkItem::default() };
        work_done.set_status(status);
        if status != WorkStatus::Ok {
            error!(
                instruction = self.instruction(),
                work_id = self.id(),
                status = %status,
                "Work item parameter check failed"
            );
        }
        ParamCheck {
            payload,
            work_done,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_payload() {
        let item = WorkItem::new(5).with_payload(21u32);
        let check = item.expect_payload::<u32>(true);
        assert!(check.is_ok());
        assert_eq!(check.payload.as_deref(), Some(&21));
        assert_eq!(check.work_done.instruction(), 5);
        assert_eq!(check.work_done.status(), WorkStatus::Ok);
    }

    #[test]
    fn test_expect_payload_wrong_type() {
        let item = WorkItem::new(5).with_payload("text");
        let check = item.expect_payload::<u32>(false);
        assert_eq!(check.status, WorkStatus::ParamObjectNull);
        assert!(check.payload.is_none());
        assert_eq!(check.work_done.instruction(), 0);
    }

    #[test]
    fn test_expect_payload_missing() {
        let check = WorkItem::new(5).expect_payload::<String>(true);
        assert_eq!(check.work_done.status(), WorkStatus::ParamObjectNull);
    }

    #[test]
    fn test_expect_no_payload() {
        assert!(WorkItem::new(1).expect_no_payload(true).is_ok());

        let check = WorkItem::new(1).with_payload(1u8).expect_no_payload(true);
        assert_eq!(check.status, WorkStatus::PayloadNotExpected);
        assert!(check.work_done.has_payload());
    }
}
