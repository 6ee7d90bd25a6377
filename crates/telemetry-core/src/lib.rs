//! Core telemetry types shared by every SimHUD telemetry source.
//!
//! ## Modules
//! - `snapshot` - Normalized per-tick vehicle state (`Snapshot`) and its clamping builder
//! - `session` - Static session metadata captured once per connection (`SessionInfo`)
//! - `source` - The `TelemetrySource` contract polled by the engine
//! - `error` - Connect/decode failures raised below the source boundary
//! - `reconnect` - Rate limiting of reconnect attempts

#![deny(static_mut_refs)]

use std::time::Instant;

pub mod error;
pub mod reconnect;
pub mod session;
pub mod snapshot;
pub mod source;

pub use error::SourceError;
pub use reconnect::{DEFAULT_RECONNECT_INTERVAL, ReconnectGate, ReconnectStats};
pub use session::SessionInfo;
pub use snapshot::{Snapshot, SnapshotBuilder};
pub use source::TelemetrySource;

/// Kilometres per hour in one metre per second.
pub const KPH_PER_MPS: f32 = 3.6;

/// Monotonic timestamp in nanoseconds relative to a process-wide epoch.
pub fn telemetry_now_ns() -> u64 {
    static EPOCH: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    let nanos = Instant::now()
        .checked_duration_since(*epoch)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    u64::try_from(nanos).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_clock_is_monotonic() {
        let first = telemetry_now_ns();
        let second = telemetry_now_ns();
        assert!(second >= first);
    }
}
