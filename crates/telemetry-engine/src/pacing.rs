//! Fixed-rate tick pacing.
//!
//! Each tick sleeps for whatever is left of its period. A tick that runs
//! long is counted as an overrun and the next tick starts immediately;
//! lost time is never caught up, so a stall cannot cause a burst of ticks.

use std::time::{Duration, Instant};

/// Sleep budget left in a tick of `period` after `elapsed` of work.
pub fn remaining_budget(period: Duration, elapsed: Duration) -> Duration {
    period.saturating_sub(elapsed)
}

/// Timing counters for the polling loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickMetrics {
    pub ticks: u64,
    pub overruns: u64,
    pub last_busy: Duration,
    pub max_busy: Duration,
}

impl TickMetrics {
    fn record(&mut self, busy: Duration, overrun: bool) {
        self.ticks = self.ticks.saturating_add(1);
        if overrun {
            self.overruns = self.overruns.saturating_add(1);
        }
        self.last_busy = busy;
        self.max_busy = self.max_busy.max(busy);
    }
}

#[derive(Debug)]
pub struct TickPacer {
    period: Duration,
    tick_start: Instant,
    metrics: TickMetrics,
}

impl TickPacer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            tick_start: Instant::now(),
            metrics: TickMetrics::default(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Mark the start of a tick.
    pub fn begin(&mut self) -> Instant {
        self.tick_start = Instant::now();
        self.tick_start
    }

    /// Close the tick at `now` and return how long to sleep before the next one.
    pub fn finish_at(&mut self, now: Instant) -> Duration {
        let busy = now.saturating_duration_since(self.tick_start);
        let remaining = remaining_budget(self.period, busy);
        self.metrics.record(busy, busy > self.period);
        remaining
    }

    /// Close the tick and sleep out the rest of the period.
    pub fn finish_and_sleep(&mut self) {
        let remaining = self.finish_at(Instant::now());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
    }

    pub fn metrics(&self) -> TickMetrics {
        self.metrics
    }
}
