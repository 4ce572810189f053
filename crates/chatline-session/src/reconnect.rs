//! Reconnection backoff.
//!
//! Two states: idle (no pending attempt) and scheduled. The policy here is
//! the counting half; the session owns the timer that makes "scheduled"
//! real.
//!
//! ```text
//! delay(attempt) = min(base * 2^attempt, cap)
//! ```

use std::time::Duration;

use crate::SessionConfig;

/// Bounded exponential backoff for reconnection attempts.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    attempt: u32,
    max_attempts: u32,
    base: Duration,
    cap: Duration,
}

impl ReconnectPolicy {
    /// Creates a policy with the attempt counter at zero.
    pub fn new(max_attempts: u32, base: Duration, cap: Duration) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            base,
            cap,
        }
    }

    /// Creates a policy from the reconnection fields of a config.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.max_reconnect_attempts,
            config.base_backoff,
            config.max_backoff,
        )
    }

    /// The delay used for attempt number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        // checked_shl returns None once the shift would overflow.
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Claims the next attempt and returns its delay, or `None` once
    /// `max_attempts` have been scheduled since the last reset.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        let delay = self.delay_for(self.attempt);
        self.attempt += 1;
        Some(delay)
    }

    /// Back to zero after a successful open or a manual disconnect.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Attempts scheduled since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Whether no further attempt may be scheduled.
    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}
