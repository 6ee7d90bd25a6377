//! Print the effective engine configuration.

use std::path::Path;

use anyhow::Result;
use serde_json::json;

use crate::commands::load_config;
use crate::error::CliError;
use crate::output;

pub fn execute(path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(path)?;
    if json {
        output::print_json(&json!({
            "success": true,
            "config": config
        }));
    } else {
        let yaml = config.to_yaml().map_err(CliError::from)?;
        print!("{yaml}");
    }
    Ok(())
}
