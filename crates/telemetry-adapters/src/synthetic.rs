//! Synthetic telemetry used when no simulator is running.
//!
//! The waveform is driven by wall-clock time so the overlay keeps moving:
//! throttle and brake are phase-shifted sinusoids, rpm follows throttle,
//! speed is an exponentially smoothed function of throttle and gear is
//! picked from speed bands.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use simhud_telemetry_core::{Snapshot, TelemetrySource};

const IDLE_RPM: f32 = 1000.0;
const RPM_RANGE: f32 = 7000.0;
const TOP_SPEED_KPH: f32 = 200.0;
/// Per-tick decay of the previous speed (60 Hz).
const SPEED_DECAY: f32 = 0.95;
const BRAKE_SCALE: f32 = 0.8;
const CLUTCH_BLIP_CHANCE: f64 = 0.1;
const CLUTCH_BLIP_MAX: f32 = 0.5;
const STEERING_AMPLITUDE: f32 = 0.3;

/// Upper speed bound (exclusive, km/h) of gears 1 to 4; faster is 5th.
const GEAR_BANDS: [f32; 4] = [20.0, 50.0, 90.0, 130.0];

/// Always-connected source producing a repeatable demo waveform.
pub struct SyntheticSource {
    started: Instant,
    speed_kph: f32,
    rng: StdRng,
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// Clutch excursions are reproducible for a given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            started: Instant::now(),
            speed_kph: 0.0,
            rng,
        }
    }

    /// Produce the sample for `t` seconds after start, advancing the speed filter one tick.
    pub fn sample_at(&mut self, t: f32) -> Snapshot {
        let throttle = (t.sin() + 1.0) / 2.0;
        let brake = (t + 2.0).sin().max(0.0) * BRAKE_SCALE;
        let clutch = if self.rng.random_bool(CLUTCH_BLIP_CHANCE) {
            self.rng.random_range(0.0..CLUTCH_BLIP_MAX)
        } else {
            0.0
        };

        self.speed_kph =
            self.speed_kph * SPEED_DECAY + throttle * TOP_SPEED_KPH * (1.0 - SPEED_DECAY);

        Snapshot::builder()
            .throttle(throttle)
            .brake(brake)
            .clutch(clutch)
            .rpm(IDLE_RPM + throttle * RPM_RANGE)
            .speed_kph(self.speed_kph)
            .gear(gear_for_speed(self.speed_kph))
            .steering_angle(STEERING_AMPLITUDE * (0.5 * t).sin())
            .active(true)
            .build()
    }
}

/// Gear shown for a given synthetic speed.
pub fn gear_for_speed(speed_kph: f32) -> i8 {
    let mut gear = 1;
    for bound in GEAR_BANDS {
        if speed_kph < bound {
            return gear;
        }
        gear += 1;
    }
    gear
}

impl TelemetrySource for SyntheticSource {
    fn update(&mut self) -> Snapshot {
        let t = self.started.elapsed().as_secs_f32();
        self.sample_at(t)
    }

    fn name(&self) -> &str {
        "Synthetic"
    }

    fn connected(&self) -> bool {
        true
    }
}
