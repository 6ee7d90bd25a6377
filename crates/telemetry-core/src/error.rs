//! Failures raised while connecting to or decoding a telemetry source.
//!
//! These never cross [`crate::TelemetrySource::update`]; sources convert
//! them into a disconnected state and an empty snapshot.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Telemetry resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Telemetry buffer truncated: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("Failed to decode telemetry data: {0}")]
    Decode(String),

    #[error("Simulator session closed")]
    SessionClosed,

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Not supported on this platform: {0}")]
    Unsupported(String),
}

impl SourceError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Whether this failure is the normal "simulator not running" case.
    ///
    /// Expected failures are logged at debug level; anything else means a
    /// live session broke and is worth a warning.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Unsupported(_) | Self::SessionClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_expected() {
        assert!(SourceError::not_found("Local\\acpmf_physics").is_expected());
        assert!(SourceError::Unsupported("mmap".to_string()).is_expected());
    }

    #[test]
    fn decode_failures_are_not_expected() {
        assert!(!SourceError::Decode("bad header".to_string()).is_expected());
        assert!(!SourceError::Truncated { needed: 8, got: 4 }.is_expected());
    }

    #[test]
    fn messages_name_the_resource() {
        let message = SourceError::not_found("Local\\acpmf_static").to_string();
        assert!(message.contains("acpmf_static"));
    }
}
