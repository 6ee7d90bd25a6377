//! The fixed-rate polling engine.
//!
//! A single worker thread owns every source. Each tick it runs one round of
//! [`Failover::poll`], stamps the result into a [`TelemetryFrame`] and
//! publishes it, then sleeps out the rest of the period.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use simhud_telemetry_adapters::{
    Snapshot, SyntheticSource, TelemetrySource, build_source, build_synthetic,
};
use simhud_telemetry_core::telemetry_now_ns;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::failover::Failover;
use crate::pacing::TickPacer;

pub const WORKER_THREAD_NAME: &str = "simhud-telemetry";

/// One published tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    /// Starts at 0 on every `start` and increases by one per tick.
    pub sequence: u64,
    pub timestamp_ns: u64,
    /// Name of the source that supplied the snapshot.
    pub source: Arc<str>,
    pub snapshot: Snapshot,
}

/// Counters for the current or most recent run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub running: bool,
    pub ticks: u64,
    pub overruns: u64,
    pub frames_published: u64,
    pub source_switches: u64,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    overruns: AtomicU64,
    frames_published: AtomicU64,
    source_switches: AtomicU64,
}

impl Counters {
    fn reset(&self) {
        for counter in [
            &self.ticks,
            &self.overruns,
            &self.frames_published,
            &self.source_switches,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

struct Worker {
    stop: Arc<AtomicBool>,
    /// Disconnects when the worker closure returns or unwinds.
    exited: Receiver<()>,
    handle: JoinHandle<Failover>,
}

/// Polls telemetry sources at a fixed rate and publishes one frame per tick.
///
/// Frames go to a bounded broadcast channel, where slow subscribers lag
/// rather than block the worker, and to a single-slot watch mailbox that
/// always holds the latest frame.
pub struct TelemetryEngine {
    config: EngineConfig,
    source_names: Vec<String>,
    failover: Option<Failover>,
    worker: Option<Worker>,
    frames: broadcast::Sender<TelemetryFrame>,
    latest: Arc<watch::Sender<Option<TelemetryFrame>>>,
    counters: Arc<Counters>,
}

impl TelemetryEngine {
    /// Build an engine over the platform sources listed in `config`.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let options = config.source_options();
        let sources = config
            .sources
            .iter()
            .map(|kind| build_source(*kind, &options))
            .collect();
        let fallback = build_synthetic(&options);
        Self::with_sources(config, sources, fallback)
    }

    /// Build an engine over caller-supplied sources, highest priority first.
    ///
    /// `config.sources` is ignored; the remaining settings apply.
    pub fn with_sources(
        config: EngineConfig,
        sources: Vec<Box<dyn TelemetrySource>>,
        fallback: SyntheticSource,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let failover = Failover::new(sources, fallback);
        let source_names = failover.source_names().map(str::to_string).collect();
        let (frames, _) = broadcast::channel(config.event_capacity);
        let (latest, _) = watch::channel(None);
        Ok(Self {
            config,
            source_names,
            failover: Some(failover),
            worker: None,
            frames,
            latest: Arc::new(latest),
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Source names in priority order, excluding the synthetic fallback.
    pub fn source_names(&self) -> &[String] {
        &self.source_names
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Start the worker thread. Does nothing if already running.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.worker.is_some() {
            debug!("Telemetry engine already running");
            return Ok(());
        }

        let mut failover = self
            .failover
            .take()
            .ok_or(EngineError::SourcesUnavailable)?;
        failover.reset_active();
        self.counters.reset();

        let stop = Arc::new(AtomicBool::new(false));
        let (exit_tx, exited) = channel::bounded::<()>(1);
        let context = WorkerContext {
            period: self.config.period(),
            stop: Arc::clone(&stop),
            frames: self.frames.clone(),
            latest: Arc::clone(&self.latest),
            counters: Arc::clone(&self.counters),
        };

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let _exit_guard = exit_tx;
                context.run(failover)
            })
            .map_err(EngineError::Spawn)?;

        info!(
            tick_rate_hz = self.config.tick_rate_hz,
            sources = ?self.source_names,
            "Telemetry engine started"
        );
        self.worker = Some(Worker {
            stop,
            exited,
            handle,
        });
        Ok(())
    }

    /// Ask the worker to stop and wait for it, bounded by the shutdown timeout.
    ///
    /// Does nothing if not running. On timeout the worker is left in place
    /// and `stop` can be called again.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        worker.stop.store(true, Ordering::Release);
        let timeout = self.config.shutdown_timeout();
        match worker.exited.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = self.config.shutdown_timeout_ms,
                    "Telemetry worker did not stop in time"
                );
                self.worker = Some(worker);
                return Err(EngineError::ShutdownTimeout {
                    timeout_ms: self.config.shutdown_timeout_ms,
                });
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
        }

        match worker.handle.join() {
            Ok(failover) => {
                self.failover = Some(failover);
                info!(stats = ?self.stats(), "Telemetry engine stopped");
                Ok(())
            }
            Err(_) => {
                warn!("Telemetry worker panicked; sources were lost");
                Err(EngineError::WorkerPanicked)
            }
        }
    }

    /// Receive every frame from now on. Subscribers that fall more than
    /// `event_capacity` frames behind skip ahead.
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryFrame> {
        self.frames.subscribe()
    }

    /// Mailbox holding the most recent frame, `None` before the first tick.
    pub fn latest(&self) -> watch::Receiver<Option<TelemetryFrame>> {
        self.latest.subscribe()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            running: self.is_running(),
            ticks: self.counters.ticks.load(Ordering::Relaxed),
            overruns: self.counters.overruns.load(Ordering::Relaxed),
            frames_published: self.counters.frames_published.load(Ordering::Relaxed),
            source_switches: self.counters.source_switches.load(Ordering::Relaxed),
        }
    }
}

impl Drop for TelemetryEngine {
    fn drop(&mut self) {
        if let Err(error) = self.stop() {
            warn!(%error, "Telemetry engine did not shut down cleanly");
        }
    }
}

impl std::fmt::Debug for TelemetryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryEngine")
            .field("config", &self.config)
            .field("sources", &self.source_names)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

struct WorkerContext {
    period: Duration,
    stop: Arc<AtomicBool>,
    frames: broadcast::Sender<TelemetryFrame>,
    latest: Arc<watch::Sender<Option<TelemetryFrame>>>,
    counters: Arc<Counters>,
}

impl WorkerContext {
    fn run(self, mut failover: Failover) -> Failover {
        debug!(period_us = self.period.as_micros(), "Telemetry worker running");
        let mut pacer = TickPacer::new(self.period);
        let switches_at_start = failover.switches();
        let mut sequence: u64 = 0;

        while !self.stop.load(Ordering::Acquire) {
            pacer.begin();

            let selection = failover.poll();
            self.publish(TelemetryFrame {
                sequence,
                timestamp_ns: telemetry_now_ns(),
                source: selection.source,
                snapshot: selection.snapshot,
            });
            sequence = sequence.wrapping_add(1);
            self.counters.source_switches.store(
                failover.switches().saturating_sub(switches_at_start),
                Ordering::Relaxed,
            );

            pacer.finish_and_sleep();
            let metrics = pacer.metrics();
            self.counters.ticks.store(metrics.ticks, Ordering::Relaxed);
            self.counters
                .overruns
                .store(metrics.overruns, Ordering::Relaxed);
        }

        let metrics = pacer.metrics();
        debug!(
            ticks = metrics.ticks,
            overruns = metrics.overruns,
            max_busy_us = metrics.max_busy.as_micros(),
            "Telemetry worker exiting"
        );
        failover
    }

    fn publish(&self, frame: TelemetryFrame) {
        self.latest.send_replace(Some(frame.clone()));
        if self.frames.send(frame).is_err() {
            trace!("No telemetry subscribers");
        }
        self.counters
            .frames_published
            .fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn fast_config() -> EngineConfig {
        EngineConfig {
            tick_rate_hz: 200,
            sources: Vec::new(),
            synthetic_seed: Some(1),
            ..EngineConfig::default()
        }
    }

    fn synthetic_only() -> Result<TelemetryEngine, EngineError> {
        TelemetryEngine::with_sources(fast_config(), Vec::new(), SyntheticSource::with_seed(1))
    }

    #[test]
    fn stop_before_start_is_a_no_op() -> TestResult {
        let mut engine = synthetic_only()?;
        engine.stop()?;
        engine.stop()?;
        assert!(!engine.is_running());
        assert_eq!(engine.stats(), EngineStats::default());
        Ok(())
    }

    #[test]
    fn start_and_stop_are_idempotent() -> TestResult {
        let mut engine = synthetic_only()?;
        engine.start()?;
        engine.start()?;
        assert!(engine.is_running());

        thread::sleep(Duration::from_millis(30));
        engine.stop()?;
        engine.stop()?;
        assert!(!engine.is_running());

        let stats = engine.stats();
        assert!(stats.ticks > 0);
        assert_eq!(stats.frames_published, stats.ticks);
        Ok(())
    }

    #[test]
    fn stop_returns_within_a_tick() -> TestResult {
        let mut engine = TelemetryEngine::with_sources(
            EngineConfig {
                tick_rate_hz: 60,
                ..fast_config()
            },
            Vec::new(),
            SyntheticSource::with_seed(2),
        )?;
        engine.start()?;
        thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        engine.stop()?;
        assert!(started.elapsed() < Duration::from_millis(200));
        Ok(())
    }

    #[test]
    fn restart_resets_sequence() -> TestResult {
        let mut engine = synthetic_only()?;
        let latest = engine.latest();
        assert!(latest.borrow().is_none());

        engine.start()?;
        thread::sleep(Duration::from_millis(30));
        engine.stop()?;
        let first_run_last = latest.borrow().as_ref().map(|frame| frame.sequence);
        assert!(first_run_last.is_some());

        let mut frames = engine.subscribe();
        engine.start()?;
        let first = frames.blocking_recv()?;
        engine.stop()?;
        assert_eq!(first.sequence, 0);
        assert_eq!(&*first.source, "Synthetic");
        Ok(())
    }

    #[test]
    fn rejects_invalid_config() {
        let config = EngineConfig {
            event_capacity: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            TelemetryEngine::with_sources(config, Vec::new(), SyntheticSource::with_seed(1)),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn platform_engine_lists_configured_sources() -> TestResult {
        let engine = TelemetryEngine::new(EngineConfig::default())?;
        assert_eq!(engine.source_names(), ["Assetto Corsa", "iRacing"]);
        assert!(!engine.is_running());
        Ok(())
    }

    #[test]
    fn frames_serialize_with_source_name() -> TestResult {
        let frame = TelemetryFrame {
            sequence: 3,
            timestamp_ns: 42,
            source: Arc::from("iRacing"),
            snapshot: Snapshot::EMPTY,
        };
        let json = serde_json::to_value(&frame)?;
        assert_eq!(json.get("source").and_then(|v| v.as_str()), Some("iRacing"));
        assert_eq!(json.get("sequence").and_then(|v| v.as_u64()), Some(3));
        Ok(())
    }
}
