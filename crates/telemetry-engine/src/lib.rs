//! Fixed-rate telemetry acquisition with priority failover.
//!
//! [`TelemetryEngine`] owns an ordered list of simulator sources plus the
//! synthetic fallback, polls them on a dedicated thread and publishes one
//! [`TelemetryFrame`] per tick.
//!
//! ```no_run
//! use simhud_telemetry_engine::{EngineConfig, TelemetryEngine};
//!
//! # fn main() -> Result<(), simhud_telemetry_engine::EngineError> {
//! let mut engine = TelemetryEngine::new(EngineConfig::default())?;
//! let latest = engine.latest();
//! engine.start()?;
//! // ... render from `latest.borrow()` ...
//! engine.stop()?;
//! # Ok(())
//! # }
//! ```

#![deny(static_mut_refs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod failover;
pub mod pacing;

pub use config::{DEFAULT_ENGINE_YAML, EngineConfig};
pub use engine::{EngineStats, TelemetryEngine, TelemetryFrame, WORKER_THREAD_NAME};
pub use error::EngineError;
pub use failover::{Failover, Selection};
pub use pacing::{TickMetrics, TickPacer, remaining_budget};

pub use simhud_telemetry_adapters::{
    Snapshot, SourceKind, SourceOptions, SyntheticSource, TelemetrySource,
};
