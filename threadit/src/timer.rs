//! # Countdown Timer
//!
//! Single-shot interval timer used for periodic ticks and work time budgets.
//! Remaining time is recomputed from the monotonic clock on every query
//! rather than decremented, so repeated queries do not accumulate drift.

use std::time::{Duration, Instant};

/// Single-shot countdown timer on the monotonic clock.
///
/// A timer that has not been started, or has been reset, reports zero
/// remaining time and is therefore expired.
///
/// Not internally synchronised: share it behind a lock if more than one
/// thread starts or queries it.
#[derive(Debug, Clone, Default)]
pub struct Timer {
    started_at: Option<Instant>,
    allowed: Duration,
    stopped_at: Option<Instant>,
}

impl Timer {
    /// Creates a timer that is not running.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a timer and starts it immediately.
    pub fn started(allowed: Duration) -> Self {
        let mut timer = Self::new();
        timer.start(allowed);
        timer
    }

    /// Starts (or restarts) timing an interval of `allowed`.
    ///
    /// Returns `false` and leaves the timer stopped if `allowed` is zero.
    pub fn start(&mut self, allowed: Duration) -> bool {
        self.stopped_at = None;
        if allowed.is_zero() {
            self.started_at = None;
            self.allowed = Duration::ZERO;
            return false;
        }
        self.allowed = allowed;
        self.started_at = Some(Instant::now());
        true
    }

    /// Stops timing and returns the elapsed time at the moment of stopping.
    pub fn stop(&mut self) -> Duration {
        let now = Instant::now();
        self.stopped_at = Some(now);
        self.elapsed_at(now)
    }

    /// Time elapsed since the timer was started. Frozen once stopped.
    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(self.stopped_at.unwrap_or_else(Instant::now))
    }

    /// Time left before expiry, clamped at zero.
    pub fn remaining(&self) -> Duration {
        self.allowed.saturating_sub(self.elapsed())
    }

    /// Whether the interval has fully elapsed.
    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Whether the timer has been started and not stopped or reset.
    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.stopped_at.is_none()
    }

    /// The interval the timer was last started with.
    pub fn allowed(&self) -> Duration {
        self.allowed
    }

    /// Returns the timer to its initial, non-running state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn elapsed_at(&self, now: Instant) -> Duration {
        match self.started_at {
            Some(start) => now.saturating_duration_since(start),
            None => Duration::ZERO,
        }
    }
}
