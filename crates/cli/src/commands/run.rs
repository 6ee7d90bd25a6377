//! Run the polling engine and print the frames it publishes.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use simhud_telemetry_engine::TelemetryEngine;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::commands::{interrupted, load_config};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: Option<PathBuf>,
    /// Stop after this long; run until Ctrl-C when `None`.
    pub duration: Option<Duration>,
    /// Print one frame in every `every`.
    pub every: u64,
    pub seed: Option<u64>,
}

pub async fn execute(options: &RunOptions, json: bool) -> Result<()> {
    let mut config = load_config(options.config.as_deref())?;
    if options.seed.is_some() {
        config.synthetic_seed = options.seed;
    }
    let every = options.every.max(1);

    let mut engine = TelemetryEngine::new(config).map_err(CliError::from)?;
    let mut frames = engine.subscribe();
    engine.start().map_err(CliError::from)?;

    let duration = options.duration;
    let deadline = async move {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);
    let stop = interrupted();
    tokio::pin!(stop);

    let mut lagged: u64 = 0;
    loop {
        tokio::select! {
            () = &mut deadline => break,
            () = &mut stop => {
                info!("Interrupted; stopping engine");
                break;
            }
            received = frames.recv() => match received {
                Ok(frame) => {
                    if frame.sequence.is_multiple_of(every) {
                        output::print_frame(&frame, json);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Frame subscriber lagged");
                    lagged = lagged.saturating_add(skipped);
                }
                Err(RecvError::Closed) => {
                    warn!("Frame channel closed");
                    break;
                }
            },
        }
    }

    engine.stop().map_err(CliError::from)?;
    output::print_engine_stats(&engine.stats(), lagged, json);
    Ok(())
}
