//! Engine configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use simhud_telemetry_adapters::{SourceKind, SourceOptions};

use crate::EngineError;

/// Shipped defaults, also used by `simhud-probe config`.
pub const DEFAULT_ENGINE_YAML: &str = include_str!("default_engine.yaml");

pub const DEFAULT_TICK_RATE_HZ: u32 = 60;
pub const MAX_TICK_RATE_HZ: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Ticks per second of the polling loop.
    pub tick_rate_hz: u32,
    /// Minimum spacing between a source's reconnect attempts.
    pub reconnect_interval_ms: u64,
    /// Simulator sources in priority order, most authoritative first.
    pub sources: Vec<SourceKind>,
    /// Frames buffered per subscriber before slow subscribers start lagging.
    pub event_capacity: usize,
    /// Upper bound on waiting for the worker to exit in `stop`.
    pub shutdown_timeout_ms: u64,
    /// Fixed seed for the synthetic fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthetic_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            reconnect_interval_ms: 2000,
            sources: vec![SourceKind::AssettoCorsa, SourceKind::IRacing],
            event_capacity: 64,
            shutdown_timeout_ms: 500,
            synthetic_seed: None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, EngineError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn to_yaml(&self) -> Result<String, EngineError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.tick_rate_hz == 0 || self.tick_rate_hz > MAX_TICK_RATE_HZ {
            return Err(EngineError::InvalidConfig(format!(
                "tick_rate_hz must be in 1..={MAX_TICK_RATE_HZ}, got {}",
                self.tick_rate_hz
            )));
        }
        if self.event_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "shutdown_timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.sources.contains(&SourceKind::Synthetic) {
            return Err(EngineError::InvalidConfig(
                "the synthetic source is always the final fallback and cannot be listed"
                    .to_string(),
            ));
        }
        for (index, kind) in self.sources.iter().enumerate() {
            if self.sources.iter().skip(index + 1).any(|other| other == kind) {
                return Err(EngineError::InvalidConfig(format!(
                    "source '{kind}' is listed more than once"
                )));
            }
        }
        Ok(())
    }

    /// Length of one tick.
    pub fn period(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate_hz.max(1)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            reconnect_interval: self.reconnect_interval(),
            synthetic_seed: self.synthetic_seed,
        }
    }
}
