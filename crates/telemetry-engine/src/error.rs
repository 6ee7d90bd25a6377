use std::path::PathBuf;

use thiserror::Error;

/// Failures of engine lifecycle and configuration.
///
/// Per-tick source failures never surface here; sources absorb them.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse engine configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("Failed to read engine configuration {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn telemetry worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Telemetry worker panicked")]
    WorkerPanicked,

    #[error("Telemetry worker did not stop within {timeout_ms}ms")]
    ShutdownTimeout { timeout_ms: u64 },

    #[error("Telemetry sources were lost by a failed worker; rebuild the engine")]
    SourcesUnavailable,
}
