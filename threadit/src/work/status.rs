use std::fmt;

/// Outcome code carried on a processed [`WorkItem`](super::WorkItem).
///
/// Failures are reported to the submitter as status values on the returned
/// item and never cross the queue boundary as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WorkStatus {
    /// Not processed yet.
    #[default]
    Pending,
    /// Processed successfully.
    Ok,
    /// The handler ran but produced no result item; the input is echoed.
    NoResult,
    /// The instruction is outside the dispatch table.
    InvalidInstruction,
    /// No handler is registered for the instruction.
    NoMethod,
    /// The handler exceeded its time budget.
    Timeout,
    /// A custom done queue was requested but no longer exists.
    InvalidDoneQueue,
    /// The item carried a payload where none was expected.
    PayloadNotExpected,
    /// The item carried no payload, or one of the wrong type.
    ParamObjectNull,
    /// The handler returned an error or panicked.
    Failed,
    /// Application-defined status.
    User(u32),
}

impl WorkStatus {
    /// Whether the item was processed without error.
    pub fn is_ok(&self) -> bool {
        matches!(self, WorkStatus::Ok | WorkStatus::NoResult)
    }

    /// Whether the status reports a failure raised by the runtime or handler.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            WorkStatus::InvalidInstruction
                | WorkStatus::NoMethod
                | WorkStatus::Timeout
                | WorkStatus::InvalidDoneQueue
                | WorkStatus::PayloadNotExpected
                | WorkStatus::ParamObjectNull
                | WorkStatus::Failed
        )
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkStatus::Pending => f.write_str("pending"),
            WorkStatus::Ok => f.write_str("ok"),
            WorkStatus::NoResult => f.write_str("handler returned no result"),
            WorkStatus::InvalidInstruction => f.write_str("invalid work instruction"),
            WorkStatus::NoMethod => f.write_str("no handler registered for instruction"),
            WorkStatus::Timeout => f.write_str("time budget exceeded"),
            WorkStatus::InvalidDoneQueue => f.write_str("done queue no longer exists"),
            WorkStatus::PayloadNotExpected => f.write_str("payload not expected"),
            WorkStatus::ParamObjectNull => f.write_str("payload missing or of the wrong type"),
            WorkStatus::Failed => f.write_str("handler failed"),
            WorkStatus::User(code) => write!(f, "user status {}", code),
        }
    }
}
