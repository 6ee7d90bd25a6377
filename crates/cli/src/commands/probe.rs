//! Poll a single telemetry source directly, outside the engine.

use std::time::Duration;

use anyhow::Result;
use simhud_telemetry_adapters::{SourceKind, SourceOptions, build_source};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::commands::interrupted;
use crate::error::CliError;
use crate::output::{self, ProbeSample, ProbeSummary};

#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub source: SourceKind,
    pub interval: Duration,
    /// Stop after this many samples; run until Ctrl-C when `None`.
    pub count: Option<u64>,
    pub reconnect_interval: Duration,
    pub seed: Option<u64>,
    /// Fail if the source never reports connected.
    pub require_connected: bool,
}

pub async fn execute(options: &ProbeOptions, json: bool) -> Result<()> {
    if options.interval.is_zero() {
        return Err(CliError::InvalidConfiguration(
            "--interval-ms must be at least 1".to_string(),
        )
        .into());
    }

    let mut source = build_source(
        options.source,
        &SourceOptions {
            reconnect_interval: options.reconnect_interval,
            synthetic_seed: options.seed,
        },
    );
    info!(
        source = %source.name(),
        interval_ms = options.interval.as_millis(),
        "Probing telemetry source"
    );

    let mut ticker = tokio::time::interval(options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let stop = interrupted();
    tokio::pin!(stop);

    let mut samples: u64 = 0;
    let mut connected_samples: u64 = 0;
    while options.count.is_none_or(|count| samples < count) {
        tokio::select! {
            _ = ticker.tick() => {}
            () = &mut stop => {
                debug!("Probe interrupted");
                break;
            }
        }

        let snapshot = source.update();
        let connected = source.connected();
        if connected {
            connected_samples = connected_samples.saturating_add(1);
        }
        output::print_probe_sample(
            &ProbeSample {
                sample: samples,
                source: source.name(),
                connected,
                snapshot: &snapshot,
            },
            json,
        );
        samples = samples.saturating_add(1);
    }

    output::print_probe_summary(
        &ProbeSummary {
            source: source.name(),
            samples,
            connected_samples,
            session: source.session_info(),
        },
        json,
    );

    if options.require_connected && connected_samples == 0 {
        return Err(CliError::SourceUnavailable(source.name().to_string()).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(count: u64) -> ProbeOptions {
        ProbeOptions {
            source: SourceKind::Synthetic,
            interval: Duration::from_millis(1),
            count: Some(count),
            reconnect_interval: Duration::from_secs(2),
            seed: Some(1),
            require_connected: true,
        }
    }

    #[tokio::test]
    async fn synthetic_probe_completes() -> Result<()> {
        execute(&synthetic(3), true).await
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let options = ProbeOptions {
            interval: Duration::ZERO,
            ..synthetic(1)
        };
        let result = execute(&options, true).await;
        assert!(matches!(
            result.as_ref().map_err(|e| e.downcast_ref::<CliError>()),
            Err(Some(CliError::InvalidConfiguration(_)))
        ));
    }

    #[tokio::test]
    async fn zero_samples_never_connect() {
        let result = execute(&synthetic(0), true).await;
        assert!(matches!(
            result.as_ref().map_err(|e| e.downcast_ref::<CliError>()),
            Err(Some(CliError::SourceUnavailable(_)))
        ));
    }
}
