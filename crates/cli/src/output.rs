//! Output formatting for CLI responses

use anyhow::Error;
use colored::*;
use serde::Serialize;
use serde_json::json;
use simhud_telemetry_core::{SessionInfo, Snapshot};
use simhud_telemetry_engine::{EngineStats, TelemetryFrame};

use crate::error::CliError;

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "type": error_type_name(error)
        }
    });
    print_json(&error_json);
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

fn error_type_name(error: &Error) -> &'static str {
    match error.downcast_ref::<CliError>() {
        Some(CliError::SourceUnavailable(_)) => "source_unavailable",
        Some(CliError::InvalidConfiguration(_)) => "invalid_configuration",
        Some(CliError::Engine(_)) => "engine",
        None => "error",
    }
}

/// Pretty-print any serializable value, reporting serialization failures on stderr.
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Failed to format output as JSON: {}", e),
    }
}

/// One line per value, for streaming output.
fn print_json_line<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Failed to format output as JSON: {}", e),
    }
}

/// Compact one-line rendering of a snapshot.
pub fn format_snapshot(snapshot: &Snapshot) -> String {
    format!(
        "gear {:>2}  rpm {:>5.0}  {:>5.1} km/h  thr {:.2} brk {:.2} clu {:.2}  steer {:+.2}",
        snapshot.gear_label(),
        snapshot.rpm,
        snapshot.speed_kph,
        snapshot.throttle,
        snapshot.brake,
        snapshot.clutch,
        snapshot.steering_angle
    )
}

#[derive(Debug, Serialize)]
pub struct ProbeSample<'a> {
    pub sample: u64,
    pub source: &'a str,
    pub connected: bool,
    pub snapshot: &'a Snapshot,
}

pub fn print_probe_sample(sample: &ProbeSample<'_>, json: bool) {
    if json {
        print_json_line(sample);
        return;
    }

    let state = if sample.connected {
        "connected".green()
    } else {
        "disconnected".red()
    };
    let marker = if sample.snapshot.active {
        "●".green()
    } else {
        "○".dimmed()
    };
    println!(
        "{:>5} {} {} {}  {}",
        sample.sample,
        marker,
        sample.source.bold(),
        state,
        format_snapshot(sample.snapshot)
    );
}

#[derive(Debug, Serialize)]
pub struct ProbeSummary<'a> {
    pub source: &'a str,
    pub samples: u64,
    pub connected_samples: u64,
    pub session: Option<&'a SessionInfo>,
}

pub fn print_probe_summary(summary: &ProbeSummary<'_>, json: bool) {
    if json {
        print_json(&json!({
            "success": true,
            "summary": summary
        }));
        return;
    }

    println!();
    println!("{}", "Probe Summary:".bold());
    println!("  Source: {}", summary.source);
    println!(
        "  Connected: {}/{} samples",
        summary.connected_samples, summary.samples
    );
    if let Some(session) = summary.session {
        print_session_human(session);
    }
}

fn print_session_human(session: &SessionInfo) {
    println!("  {}", "Session:".bold());
    if !session.car_model.is_empty() {
        println!("    Car: {}", session.car_model);
    }
    if !session.track.is_empty() {
        println!("    Track: {}", session.track);
    }
    if !session.player_name.is_empty() {
        println!("    Driver: {}", session.player_name);
    }
    if session.max_rpm > 0.0 {
        println!("    Max RPM: {:.0}", session.max_rpm);
    }
    if !session.simulator_version.is_empty() {
        println!("    Version: {}", session.simulator_version.dimmed());
    }
}

pub fn print_frame(frame: &TelemetryFrame, json: bool) {
    if json {
        print_json_line(frame);
        return;
    }

    println!(
        "{:>7} {:<14} {}",
        frame.sequence,
        frame.source.cyan(),
        format_snapshot(&frame.snapshot)
    );
}

pub fn print_engine_stats(stats: &EngineStats, lagged: u64, json: bool) {
    if json {
        print_json(&json!({
            "success": true,
            "stats": stats,
            "lagged_frames": lagged
        }));
        return;
    }

    println!();
    println!("{}", "Engine Stats:".bold());
    println!("  Ticks: {}", stats.ticks);
    println!("  Frames published: {}", stats.frames_published);
    println!("  Source switches: {}", stats.source_switches);
    let overruns = stats.overruns.to_string();
    if stats.overruns > 0 {
        println!("  Overruns: {}", overruns.yellow());
    } else {
        println!("  Overruns: {}", overruns);
    }
    if lagged > 0 {
        println!("  Frames skipped by this subscriber: {}", lagged.to_string().yellow());
    }
}
