//! simhud-probe - SimHUD telemetry diagnostics
//!
//! Polls individual simulator sources, runs the polling engine with its
//! failover, and prints the effective engine configuration.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod error;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use simhud_telemetry_adapters::SourceKind;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::probe::ProbeOptions;
use crate::commands::run::RunOptions;
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "simhud-probe")]
#[command(about = "SimHUD telemetry probe - inspect simulator sources and the polling engine")]
#[command(version)]
#[command(long_about = "
simhud-probe reads live telemetry from racing simulators the same way the
SimHUD overlay does. Probe a single source to check that a simulator is
visible, or run the full engine to watch priority failover between sources.

Use --json for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Output format (human-readable or JSON)
    #[arg(
        long,
        global = true,
        help = "Output in JSON format for machine parsing"
    )]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll one telemetry source directly and print each sample
    Probe {
        /// Source to poll (assetto-corsa, iracing, synthetic)
        #[arg(short, long, default_value = "synthetic")]
        source: SourceKind,

        /// Delay between samples in milliseconds
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,

        /// Number of samples to take (default: until Ctrl-C)
        #[arg(short = 'n', long)]
        count: Option<u64>,

        /// Minimum delay between reconnect attempts in milliseconds
        #[arg(long, default_value_t = 2000)]
        reconnect_ms: u64,

        /// Seed for the synthetic source
        #[arg(long, env = "SIMHUD_SYNTHETIC_SEED")]
        seed: Option<u64>,

        /// Exit with an error if the source never connects
        #[arg(long)]
        require_connected: bool,
    },

    /// Run the polling engine and print published frames
    Run {
        /// Engine configuration file (YAML)
        #[arg(short, long, env = "SIMHUD_ENGINE_CONFIG")]
        config: Option<PathBuf>,

        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(short, long)]
        duration_secs: Option<u64>,

        /// Print every Nth frame
        #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u64).range(1..))]
        every: u64,

        /// Seed for the synthetic fallback, overriding the configuration
        #[arg(long, env = "SIMHUD_SYNTHETIC_SEED")]
        seed: Option<u64>,
    },

    /// Print the effective engine configuration
    Config {
        /// Engine configuration file (YAML)
        #[arg(short, long, env = "SIMHUD_ENGINE_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "simhud_probe={log_level},simhud_telemetry_engine={log_level},simhud_telemetry_adapters={log_level}"
                )
                .into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let result = execute_command(&cli).await;

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }

            let exit_code = e
                .downcast_ref::<CliError>()
                .map_or(1, CliError::exit_code);
            std::process::exit(exit_code);
        }
    }
}

async fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Probe {
            source,
            interval_ms,
            count,
            reconnect_ms,
            seed,
            require_connected,
        } => {
            let options = ProbeOptions {
                source: *source,
                interval: Duration::from_millis(*interval_ms),
                count: *count,
                reconnect_interval: Duration::from_millis(*reconnect_ms),
                seed: *seed,
                require_connected: *require_connected,
            };
            commands::probe::execute(&options, cli.json).await
        }
        Commands::Run {
            config,
            duration_secs,
            every,
            seed,
        } => {
            let options = RunOptions {
                config: config.clone(),
                duration: duration_secs.map(Duration::from_secs),
                every: *every,
                seed: *seed,
            };
            commands::run::execute(&options, cli.json).await
        }
        Commands::Config { config } => commands::config::execute(config.as_deref(), cli.json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    // --- Global flag parsing ---

    #[test]
    fn parse_probe_defaults() -> TestResult {
        let cli = Cli::try_parse_from(["simhud-probe", "probe"])?;
        assert!(!cli.json);
        assert_eq!(cli.verbose, 0);
        assert!(matches!(
            cli.command,
            Commands::Probe {
                source: SourceKind::Synthetic,
                interval_ms: 100,
                count: None,
                reconnect_ms: 2000,
                require_connected: false,
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn parse_global_json_flag_before_subcommand() -> TestResult {
        let cli = Cli::try_parse_from(["simhud-probe", "--json", "config"])?;
        assert!(cli.json);
        Ok(())
    }

    #[test]
    fn parse_global_json_flag_after_subcommand() -> TestResult {
        let cli = Cli::try_parse_from(["simhud-probe", "config", "--json"])?;
        assert!(cli.json);
        Ok(())
    }

    #[test]
    fn parse_verbose_levels() -> TestResult {
        let cli0 = Cli::try_parse_from(["simhud-probe", "config"])?;
        assert_eq!(cli0.verbose, 0);

        let cli2 = Cli::try_parse_from(["simhud-probe", "-vv", "config"])?;
        assert_eq!(cli2.verbose, 2);

        let cli3 = Cli::try_parse_from(["simhud-probe", "-vvv", "config"])?;
        assert_eq!(cli3.verbose, 3);
        Ok(())
    }

    // --- Probe parsing ---

    #[test]
    fn parse_probe_source_and_count() -> TestResult {
        let cli = Cli::try_parse_from([
            "simhud-probe",
            "probe",
            "--source",
            "iracing",
            "-n",
            "5",
            "--interval-ms",
            "16",
            "--require-connected",
        ])?;
        assert!(matches!(
            cli.command,
            Commands::Probe {
                source: SourceKind::IRacing,
                count: Some(5),
                interval_ms: 16,
                require_connected: true,
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn parse_probe_rejects_unknown_source() {
        let result = Cli::try_parse_from(["simhud-probe", "probe", "--source", "rfactor2"]);
        assert!(matches!(result, Err(_)));
    }

    // --- Run parsing ---

    #[test]
    fn parse_run_with_config_and_duration() -> TestResult {
        let cli = Cli::try_parse_from([
            "simhud-probe",
            "run",
            "--config",
            "engine.yaml",
            "--duration-secs",
            "3",
        ])?;
        match cli.command {
            Commands::Run {
                config,
                duration_secs,
                every,
                ..
            } => {
                assert_eq!(config, Some(PathBuf::from("engine.yaml")));
                assert_eq!(duration_secs, Some(3));
                assert_eq!(every, 15);
            }
            _ => return Err("expected run command".into()),
        }
        Ok(())
    }

    #[test]
    fn parse_run_rejects_zero_every() {
        let result = Cli::try_parse_from(["simhud-probe", "run", "--every", "0"]);
        assert!(matches!(result, Err(_)));
    }
}
