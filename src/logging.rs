//! Log-flood prevention
//!
//! Long-lived producer loops can hit the same failure thousands of times in a
//! row (unplugged sensor, provider outage). Each failure class owns a
//! [`LogGate`] that lets one message through per throttle window and swallows
//! the rest. The gate is a plain timestamp check, not a leaky bucket: a
//! message is emitted iff `now - last_emitted > interval`.

use std::time::{Duration, Instant};

/// Default throttle window applied to repeated failures of one class.
pub const DEFAULT_THROTTLE: Duration = Duration::from_secs(5);

/// Per-failure-class emission gate.
///
/// Owned by the loop that logs through it; one gate per failure class so an
/// ingest decode storm cannot silence weather-fetch errors.
#[derive(Debug)]
pub struct LogGate {
    interval: Duration,
    last_emitted: Option<Instant>,
}

impl LogGate {
    /// Gate with the default 5 second window.
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_THROTTLE)
    }

    /// Gate with a custom window.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            last_emitted: None,
        }
    }

    /// Check the gate against an explicit clock reading.
    ///
    /// Returns `true` (and arms the gate) if the caller should emit now.
    /// The first call always passes.
    pub fn ready_at(&mut self, now: Instant) -> bool {
        let pass = match self.last_emitted {
            None => true,
            Some(last) => now.duration_since(last) > self.interval,
        };
        if pass {
            self.last_emitted = Some(now);
        }
        pass
    }

    /// Check the gate against the wall clock.
    pub fn ready(&mut self) -> bool {
        self.ready_at(Instant::now())
    }
}

impl Default for LogGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Emit a throttled `tracing::warn!` with the message dropped silently when
/// the gate is closed.
#[macro_export]
macro_rules! throttled_warn {
    ($gate:expr, $($arg:tt)*) => {
        if $gate.ready() {
            tracing::warn!($($arg)*);
        }
    };
}

/// Emit a throttled `tracing::error!`.
#[macro_export]
macro_rules! throttled_error {
    ($gate:expr, $($arg:tt)*) => {
        if $gate.ready() {
            tracing::error!($($arg)*);
        }
    };
}
