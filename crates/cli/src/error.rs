//! Error types for simhud-probe

use simhud_telemetry_engine::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Source never connected: {0}")]
    SourceUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

impl CliError {
    /// Process exit code reported for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SourceUnavailable(_) => 2,
            Self::InvalidConfiguration(_) => 4,
            Self::Engine(
                EngineError::InvalidConfig(_)
                | EngineError::ConfigParse(_)
                | EngineError::ConfigIo { .. },
            ) => 4,
            Self::Engine(_) => 5,
        }
    }
}
