//! Command implementations for simhud-probe

pub mod config;
pub mod probe;
pub mod run;

use std::path::Path;

use anyhow::Result;
use simhud_telemetry_engine::{DEFAULT_ENGINE_YAML, EngineConfig};

use crate::error::CliError;

/// Load the engine configuration from `path`, or the shipped defaults.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path),
        None => EngineConfig::from_yaml_str(DEFAULT_ENGINE_YAML),
    }
    .map_err(CliError::from)?;
    Ok(config)
}

/// Resolves on Ctrl-C. A failure to install the handler is logged and
/// treated as never interrupted.
pub(crate) async fn interrupted() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "Unable to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
