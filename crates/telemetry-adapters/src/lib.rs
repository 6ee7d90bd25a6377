//! Simulator telemetry sources.
//!
//! Each source implements [`TelemetrySource`] and owns its own connection
//! lifecycle: shared-memory pages for Assetto Corsa, an SDK session for
//! iRacing, and a synthetic generator that is always available.

#![deny(static_mut_refs)]

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use simhud_telemetry_core::{
    DEFAULT_RECONNECT_INTERVAL, SessionInfo, Snapshot, SourceError, TelemetrySource,
};

pub mod assetto_corsa;
mod decode;
pub mod iracing;
pub mod shm;
pub mod synthetic;

pub use assetto_corsa::AssettoCorsaSource;
pub use iracing::{IRacingSource, IrsdkSession, SdkSession, SdkValue};
pub use shm::{InMemorySharedMemory, MappedRegion, PlatformSharedMemory, SharedMemory};
pub use synthetic::SyntheticSource;

/// Identifies a shipped telemetry source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    AssettoCorsa,
    #[serde(rename = "iracing")]
    IRacing,
    Synthetic,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [Self::AssettoCorsa, Self::IRacing, Self::Synthetic];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AssettoCorsa => "assetto-corsa",
            Self::IRacing => "iracing",
            Self::Synthetic => "synthetic",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|kind| kind.as_str()).collect();
                format!(
                    "unknown telemetry source '{value}' (expected one of: {})",
                    known.join(", ")
                )
            })
    }
}

/// Settings shared by every source built through [`build_source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceOptions {
    pub reconnect_interval: Duration,
    /// Seed for the synthetic source; `None` seeds from the OS.
    pub synthetic_seed: Option<u64>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            synthetic_seed: None,
        }
    }
}

/// Build a source backed by the platform's real simulator interfaces.
pub fn build_source(kind: SourceKind, options: &SourceOptions) -> Box<dyn TelemetrySource> {
    match kind {
        SourceKind::AssettoCorsa => Box::new(AssettoCorsaSource::with_memory(
            PlatformSharedMemory,
            options.reconnect_interval,
        )),
        SourceKind::IRacing => Box::new(IRacingSource::with_session(
            IrsdkSession::default(),
            options.reconnect_interval,
        )),
        SourceKind::Synthetic => Box::new(build_synthetic(options)),
    }
}

pub fn build_synthetic(options: &SourceOptions) -> SyntheticSource {
    match options.synthetic_seed {
        Some(seed) => SyntheticSource::with_seed(seed),
        None => SyntheticSource::new(),
    }
}
