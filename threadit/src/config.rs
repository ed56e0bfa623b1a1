use std::time::Duration;

/// Number of slots in an active object's dispatch table.
/// Valid work instructions are `0..MAX_WORK_METHODS`.
pub const MAX_WORK_METHODS: u32 = 50;

/// Default interval between periodic handler invocations.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(2000);

/// Default name given to active objects that are not named explicitly.
pub const DEFAULT_NAME: &str = "threadit";

// --- Active Object Configuration ---

/// Configuration for a single active object.
#[derive(Clone, Debug)]
pub struct ActiveObjectConfig {
    /// Name of the active object. Reported to work-done callbacks and
    /// included in the thread name.
    pub name: String,

    /// Interval between periodic ticks. `None` disables periodic ticking.
    pub period: Option<Duration>,

    /// Prefix of the object's thread name, see
    /// [`thread_name`](Self::thread_name). Empty means no prefix.
    pub thread_name_prefix: String,
}

impl Default for ActiveObjectConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            period: Some(DEFAULT_PERIOD),
            thread_name_prefix: "threadit-worker".to_string(),
        }
    }
}

impl ActiveObjectConfig {
    /// Creates a configuration with the given name and default settings otherwise.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Name requested for the object's thread: `{prefix}-{name}`, or just
    /// the name when the prefix is empty.
    pub fn thread_name(&self) -> String {
        if self.thread_name_prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{}-{}", self.thread_name_prefix, self.name)
        }
    }

    /// Normalises a requested period: zero means "never tick".
    pub fn normalize_period(period: Duration) -> Option<Duration> {
        if period.is_zero() {
            None
        } else {
            Some(period)
        }
    }
}
