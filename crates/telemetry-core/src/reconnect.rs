//! Reconnect attempt rate limiting.
//!
//! Opening a simulator's shared memory or SDK session is comparatively
//! expensive and usually fails while the game is closed. Sources consult a
//! [`ReconnectGate`] before each attempt so the 60 Hz engine loop does not
//! hammer the OS with open calls.

use std::time::{Duration, Instant};

/// Minimum spacing between reconnect attempts used by the shipped sources.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(2);

/// Allows at most one attempt per `min_interval`.
#[derive(Debug, Clone)]
pub struct ReconnectGate {
    min_interval: Duration,
    last_attempt: Option<Instant>,
    attempts: u64,
    throttled: u64,
}

impl Default for ReconnectGate {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_INTERVAL)
    }
}

impl ReconnectGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_attempt: None,
            attempts: 0,
            throttled: 0,
        }
    }

    /// Returns true if an attempt may be made now, and records it.
    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Clock-injected form of [`ReconnectGate::try_acquire`].
    pub fn try_acquire_at(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_attempt
            && now.saturating_duration_since(last) < self.min_interval
        {
            self.throttled = self.throttled.saturating_add(1);
            return false;
        }

        self.last_attempt = Some(now);
        self.attempts = self.attempts.saturating_add(1);
        true
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Number of attempts let through.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Number of attempts refused for arriving too early.
    pub fn throttled(&self) -> u64 {
        self.throttled
    }

    pub fn stats(&self) -> ReconnectStats {
        ReconnectStats::from(self)
    }
}

/// Gate counters for diagnostics output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectStats {
    pub min_interval_ms: u64,
    pub attempts: u64,
    pub throttled: u64,
}

impl From<&ReconnectGate> for ReconnectStats {
    fn from(gate: &ReconnectGate) -> Self {
        Self {
            min_interval_ms: u64::try_from(gate.min_interval.as_millis()).unwrap_or(u64::MAX),
            attempts: gate.attempts,
            throttled: gate.throttled,
        }
    }
}
