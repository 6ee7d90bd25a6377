//! Assetto Corsa telemetry source using the game's shared memory pages.
//!
//! AC publishes three named mappings while running:
//! - `Local\acpmf_physics`  - per-frame car state (pedals, rpm, speed, steer, gear)
//! - `Local\acpmf_graphics` - session status (OFF / REPLAY / LIVE / PAUSE)
//! - `Local\acpmf_static`   - per-session metadata (car, track, driver, limits)
//!
//! All structs are little-endian, `#pragma pack(4)`. Offsets used here:
//!
//! | Page     | Field        | Offset | Type        |
//! |----------|--------------|--------|-------------|
//! | physics  | gas          | 4      | f32         |
//! | physics  | brake        | 8      | f32         |
//! | physics  | gear         | 16     | i32         |
//! | physics  | rpms         | 20     | i32         |
//! | physics  | steerAngle   | 24     | f32         |
//! | physics  | speedKmh     | 28     | f32         |
//! | physics  | clutch       | 364    | f32         |
//! | graphics | status       | 4      | i32         |
//! | static   | carModel     | 68     | wchar\[33\] |
//! | static   | track        | 134    | wchar\[33\] |
//! | static   | maxRpm       | 412    | i32         |
//!
//! Gear is reported as `0 = R, 1 = N, 2 = 1st`; steering is positive to the
//! right. Snapshots from this source use `-1 = R` gears and positive-left
//! steering.

use std::time::Duration;

use simhud_telemetry_core::{
    DEFAULT_RECONNECT_INTERVAL, ReconnectGate, SessionInfo, Snapshot, SourceError,
    TelemetrySource,
};
use tracing::{debug, info, warn};

use crate::decode::{read_f32, read_i32, read_wide_string, require_len};
use crate::shm::{MappedRegion, PlatformSharedMemory, SharedMemory};

pub const PHYSICS_SEGMENT: &str = "Local\\acpmf_physics";
pub const GRAPHICS_SEGMENT: &str = "Local\\acpmf_graphics";
pub const STATIC_SEGMENT: &str = "Local\\acpmf_static";

/// Bytes needed to reach the last physics field read (clutch @ 364).
pub const PHYSICS_MIN_SIZE: usize = 368;
/// Bytes needed to reach the session status (status @ 4).
pub const GRAPHICS_MIN_SIZE: usize = 8;
/// Bytes needed to reach the last static field read (maxFuel @ 416).
pub const STATIC_MIN_SIZE: usize = 420;

const OFF_PACKET_ID: usize = 0;
const OFF_GAS: usize = 4;
const OFF_BRAKE: usize = 8;
const OFF_GEAR: usize = 16;
const OFF_RPMS: usize = 20;
const OFF_STEER_ANGLE: usize = 24;
const OFF_SPEED_KMH: usize = 28;
const OFF_CLUTCH: usize = 364;

const OFF_STATUS: usize = 4;

const OFF_SM_VERSION: usize = 0;
const OFF_AC_VERSION: usize = 30;
const OFF_NUMBER_OF_SESSIONS: usize = 60;
const OFF_NUM_CARS: usize = 64;
const OFF_CAR_MODEL: usize = 68;
const OFF_TRACK: usize = 134;
const OFF_PLAYER_NAME: usize = 200;
const OFF_PLAYER_SURNAME: usize = 266;
const OFF_PLAYER_NICK: usize = 332;
const OFF_SECTOR_COUNT: usize = 400;
const OFF_MAX_TORQUE: usize = 404;
const OFF_MAX_POWER: usize = 408;
const OFF_MAX_RPM: usize = 412;
const OFF_MAX_FUEL: usize = 416;

const VERSION_CHARS: usize = 15;
const NAME_CHARS: usize = 33;

/// Session status published in the graphics page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcStatus {
    Off,
    Replay,
    Live,
    Pause,
}

impl AcStatus {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Off),
            1 => Some(Self::Replay),
            2 => Some(Self::Live),
            3 => Some(Self::Pause),
            _ => None,
        }
    }
}

/// Decoded fields of the physics page.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhysicsPage {
    pub packet_id: i32,
    pub gas: f32,
    pub brake: f32,
    pub clutch: f32,
    pub gear: i32,
    pub rpms: i32,
    pub steer_angle: f32,
    pub speed_kmh: f32,
}

/// Decoded fields of the graphics page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphicsPage {
    pub packet_id: i32,
    pub status: i32,
}

impl GraphicsPage {
    pub fn status(&self) -> Option<AcStatus> {
        AcStatus::from_raw(self.status)
    }
}

pub fn decode_physics(data: &[u8]) -> Result<PhysicsPage, SourceError> {
    require_len(data, PHYSICS_MIN_SIZE)?;
    Ok(PhysicsPage {
        packet_id: read_i32(data, OFF_PACKET_ID).unwrap_or(0),
        gas: read_f32(data, OFF_GAS).unwrap_or(0.0),
        brake: read_f32(data, OFF_BRAKE).unwrap_or(0.0),
        clutch: read_f32(data, OFF_CLUTCH).unwrap_or(0.0),
        gear: read_i32(data, OFF_GEAR).unwrap_or(1),
        rpms: read_i32(data, OFF_RPMS).unwrap_or(0),
        steer_angle: read_f32(data, OFF_STEER_ANGLE).unwrap_or(0.0),
        speed_kmh: read_f32(data, OFF_SPEED_KMH).unwrap_or(0.0),
    })
}

pub fn decode_graphics(data: &[u8]) -> Result<GraphicsPage, SourceError> {
    require_len(data, GRAPHICS_MIN_SIZE)?;
    Ok(GraphicsPage {
        packet_id: read_i32(data, OFF_PACKET_ID).unwrap_or(0),
        status: read_i32(data, OFF_STATUS).unwrap_or(0),
    })
}

pub fn decode_static(data: &[u8]) -> Result<SessionInfo, SourceError> {
    require_len(data, STATIC_MIN_SIZE)?;

    let name = read_wide_string(data, OFF_PLAYER_NAME, NAME_CHARS);
    let surname = read_wide_string(data, OFF_PLAYER_SURNAME, NAME_CHARS);
    let player_name = format!("{name} {surname}").trim().to_string();

    Ok(SessionInfo {
        simulator_version: read_wide_string(data, OFF_AC_VERSION, VERSION_CHARS),
        interface_version: read_wide_string(data, OFF_SM_VERSION, VERSION_CHARS),
        car_model: read_wide_string(data, OFF_CAR_MODEL, NAME_CHARS),
        track: read_wide_string(data, OFF_TRACK, NAME_CHARS),
        player_name,
        player_nick: read_wide_string(data, OFF_PLAYER_NICK, NAME_CHARS),
        session_count: read_i32(data, OFF_NUMBER_OF_SESSIONS).unwrap_or(0),
        car_count: read_i32(data, OFF_NUM_CARS).unwrap_or(0),
        sector_count: read_i32(data, OFF_SECTOR_COUNT).unwrap_or(0),
        max_rpm: read_i32(data, OFF_MAX_RPM).unwrap_or(0) as f32,
        max_fuel: read_f32(data, OFF_MAX_FUEL).unwrap_or(0.0),
        max_torque: read_f32(data, OFF_MAX_TORQUE).unwrap_or(0.0),
        max_power: read_f32(data, OFF_MAX_POWER).unwrap_or(0.0),
    })
}

/// AC gear index (`0 = R, 1 = N, 2 = 1st`) to normalized gear.
pub fn map_gear(raw: i32) -> i8 {
    let normalized = raw.saturating_sub(1).clamp(-1, i32::from(i8::MAX));
    i8::try_from(normalized).unwrap_or(0)
}

pub fn build_snapshot(physics: &PhysicsPage, graphics: &GraphicsPage) -> Snapshot {
    Snapshot::builder()
        .throttle(physics.gas)
        .brake(physics.brake)
        .clutch(physics.clutch)
        .rpm(physics.rpms as f32)
        .speed_kph(physics.speed_kmh)
        .gear(map_gear(physics.gear))
        .steering_angle(-physics.steer_angle)
        .active(graphics.status() == Some(AcStatus::Live))
        .build()
}

struct Pages {
    physics: Box<dyn MappedRegion>,
    graphics: Box<dyn MappedRegion>,
    // Held for the connection's lifetime so the session metadata stays mapped.
    _statics: Box<dyn MappedRegion>,
}

/// Assetto Corsa shared-memory telemetry source.
pub struct AssettoCorsaSource<S: SharedMemory = PlatformSharedMemory> {
    memory: S,
    pages: Option<Pages>,
    session: Option<SessionInfo>,
    gate: ReconnectGate,
    physics_buf: Vec<u8>,
    graphics_buf: Vec<u8>,
}

impl Default for AssettoCorsaSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AssettoCorsaSource {
    pub fn new() -> Self {
        Self::with_memory(PlatformSharedMemory, DEFAULT_RECONNECT_INTERVAL)
    }
}

impl<S: SharedMemory> AssettoCorsaSource<S> {
    pub fn with_memory(memory: S, reconnect_interval: Duration) -> Self {
        Self {
            memory,
            pages: None,
            session: None,
            gate: ReconnectGate::new(reconnect_interval),
            physics_buf: vec![0; PHYSICS_MIN_SIZE],
            graphics_buf: vec![0; GRAPHICS_MIN_SIZE],
        }
    }

    pub fn reconnect_gate(&self) -> &ReconnectGate {
        &self.gate
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        let physics = self.memory.open(PHYSICS_SEGMENT, PHYSICS_MIN_SIZE)?;
        let graphics = self.memory.open(GRAPHICS_SEGMENT, GRAPHICS_MIN_SIZE)?;
        let statics = self.memory.open(STATIC_SEGMENT, STATIC_MIN_SIZE)?;

        let mut static_buf = vec![0u8; STATIC_MIN_SIZE];
        statics.read_at(0, &mut static_buf)?;
        let session = decode_static(&static_buf)?;

        info!(
            car = %session.car_model,
            track = %session.track,
            version = %session.simulator_version,
            "Connected to Assetto Corsa shared memory"
        );

        self.session = Some(session);
        self.pages = Some(Pages {
            physics,
            graphics,
            _statics: statics,
        });
        Ok(())
    }

    fn disconnect(&mut self) {
        self.pages = None;
        self.session = None;
    }

    fn read_frame(&mut self) -> Result<Snapshot, SourceError> {
        let pages = self
            .pages
            .as_ref()
            .ok_or_else(|| SourceError::not_found(PHYSICS_SEGMENT))?;

        pages.physics.read_at(0, &mut self.physics_buf)?;
        pages.graphics.read_at(0, &mut self.graphics_buf)?;

        let physics = decode_physics(&self.physics_buf)?;
        let graphics = decode_graphics(&self.graphics_buf)?;
        Ok(build_snapshot(&physics, &graphics))
    }
}

impl<S: SharedMemory> TelemetrySource for AssettoCorsaSource<S> {
    fn update(&mut self) -> Snapshot {
        if self.pages.is_none() {
            if !self.gate.try_acquire() {
                return Snapshot::EMPTY;
            }
            if let Err(error) = self.connect() {
                if error.is_expected() {
                    debug!(error = %error, "Assetto Corsa shared memory unavailable");
                } else {
                    warn!(error = %error, "Failed to connect to Assetto Corsa shared memory");
                }
                self.disconnect();
                return Snapshot::EMPTY;
            }
        }

        match self.read_frame() {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(error = %error, "Lost Assetto Corsa shared memory; reconnecting");
                self.disconnect();
                Snapshot::EMPTY
            }
        }
    }

    fn name(&self) -> &str {
        "Assetto Corsa"
    }

    fn connected(&self) -> bool {
        self.pages.is_some()
    }

    fn session_info(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shm::InMemorySharedMemory;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn write_f32(buf: &mut [u8], offset: usize, value: f32) {
        buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn write_i32(buf: &mut [u8], offset: usize, value: i32) {
        buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn write_wide(buf: &mut [u8], offset: usize, value: &str) {
        for (index, unit) in value.encode_utf16().enumerate() {
            let at = offset + index * 2;
            buf[at..at + 2].copy_from_slice(&unit.to_le_bytes());
        }
    }

    fn physics_page(gas: f32, gear: i32, steer: f32) -> Vec<u8> {
        let mut page = vec![0u8; PHYSICS_MIN_SIZE];
        write_f32(&mut page, OFF_GAS, gas);
        write_f32(&mut page, OFF_BRAKE, 0.1);
        write_i32(&mut page, OFF_GEAR, gear);
        write_i32(&mut page, OFF_RPMS, 6500);
        write_f32(&mut page, OFF_STEER_ANGLE, steer);
        write_f32(&mut page, OFF_SPEED_KMH, 142.5);
        write_f32(&mut page, OFF_CLUTCH, 0.0);
        page
    }

    fn graphics_page(status: i32) -> Vec<u8> {
        let mut page = vec![0u8; GRAPHICS_MIN_SIZE];
        write_i32(&mut page, OFF_STATUS, status);
        page
    }

    fn static_page() -> Vec<u8> {
        let mut page = vec![0u8; STATIC_MIN_SIZE];
        write_wide(&mut page, OFF_SM_VERSION, "1.7");
        write_wide(&mut page, OFF_AC_VERSION, "1.16.4");
        write_i32(&mut page, OFF_NUMBER_OF_SESSIONS, 1);
        write_i32(&mut page, OFF_NUM_CARS, 12);
        write_wide(&mut page, OFF_CAR_MODEL, "ks_porsche_911_gt3_r_2016");
        write_wide(&mut page, OFF_TRACK, "spa");
        write_wide(&mut page, OFF_PLAYER_NAME, "Jo");
        write_wide(&mut page, OFF_PLAYER_SURNAME, "Siffert");
        write_wide(&mut page, OFF_PLAYER_NICK, "SEP");
        write_i32(&mut page, OFF_SECTOR_COUNT, 3);
        write_i32(&mut page, OFF_MAX_RPM, 9250);
        write_f32(&mut page, OFF_MAX_FUEL, 120.0);
        page
    }

    fn running_game(memory: &InMemorySharedMemory, physics: Vec<u8>, status: i32) {
        memory.publish(PHYSICS_SEGMENT, physics);
        memory.publish(GRAPHICS_SEGMENT, graphics_page(status));
        memory.publish(STATIC_SEGMENT, static_page());
    }

    fn source(memory: &InMemorySharedMemory) -> AssettoCorsaSource<InMemorySharedMemory> {
        AssettoCorsaSource::with_memory(memory.clone(), Duration::ZERO)
    }

    #[test]
    fn gear_remap() {
        assert_eq!(map_gear(0), -1);
        assert_eq!(map_gear(1), 0);
        assert_eq!(map_gear(2), 1);
        assert_eq!(map_gear(7), 6);
        assert_eq!(map_gear(i32::MAX), i8::MAX);
        assert_eq!(map_gear(-5), -1);
    }

    #[test]
    fn status_values() {
        assert_eq!(AcStatus::from_raw(0), Some(AcStatus::Off));
        assert_eq!(AcStatus::from_raw(2), Some(AcStatus::Live));
        assert_eq!(AcStatus::from_raw(3), Some(AcStatus::Pause));
        assert_eq!(AcStatus::from_raw(9), None);
    }

    #[test]
    fn decode_rejects_short_pages() {
        assert!(matches!(decode_physics(&[0u8; PHYSICS_MIN_SIZE - 1]), Err(_)));
        assert!(matches!(decode_graphics(&[0u8; 4]), Err(_)));
        assert!(matches!(decode_static(&[0u8; 100]), Err(_)));
    }

    #[test]
    fn decode_physics_fields() -> TestResult {
        let mut page = physics_page(0.75, 4, 0.1);
        write_f32(&mut page, OFF_CLUTCH, 0.3);
        let physics = decode_physics(&page)?;

        assert!((physics.gas - 0.75).abs() < f32::EPSILON);
        assert_eq!(physics.gear, 4);
        assert_eq!(physics.rpms, 6500);
        assert!((physics.speed_kmh - 142.5).abs() < f32::EPSILON);
        assert!((physics.clutch - 0.3).abs() < f32::EPSILON);
        Ok(())
    }

    #[test]
    fn decode_static_session() -> TestResult {
        let session = decode_static(&static_page())?;

        assert_eq!(session.car_model, "ks_porsche_911_gt3_r_2016");
        assert_eq!(session.track, "spa");
        assert_eq!(session.player_name, "Jo Siffert");
        assert_eq!(session.player_nick, "SEP");
        assert_eq!(session.simulator_version, "1.16.4");
        assert_eq!(session.interface_version, "1.7");
        assert_eq!(session.car_count, 12);
        assert_eq!(session.sector_count, 3);
        assert!((session.max_rpm - 9250.0).abs() < f32::EPSILON);
        Ok(())
    }

    #[test]
    fn reverse_live_round_trip() -> TestResult {
        let physics = decode_physics(&physics_page(0.0, 0, 0.2))?;
        let graphics = decode_graphics(&graphics_page(2))?;
        let snapshot = build_snapshot(&physics, &graphics);

        assert_eq!(snapshot.gear, -1);
        assert!(snapshot.active);
        assert!((snapshot.steering_angle + 0.2).abs() < f32::EPSILON);
        Ok(())
    }

    #[test]
    fn paused_session_is_inactive() -> TestResult {
        let physics = decode_physics(&physics_page(0.5, 3, 0.0))?;
        for status in [0, 1, 3] {
            let snapshot = build_snapshot(&physics, &decode_graphics(&graphics_page(status))?);
            assert!(!snapshot.active, "status {status} should be inactive");
        }
        Ok(())
    }

    #[test]
    fn out_of_range_pedals_are_clamped() -> TestResult {
        let physics = decode_physics(&physics_page(1.4, 2, 0.0))?;
        let snapshot = build_snapshot(&physics, &GraphicsPage::default());
        assert!((snapshot.throttle - 1.0).abs() < f32::EPSILON);
        Ok(())
    }

    #[test]
    fn missing_game_stays_disconnected() {
        let memory = InMemorySharedMemory::new();
        let mut source = source(&memory);

        assert!(source.update().is_empty());
        assert!(!source.connected());
        assert!(source.session_info().is_none());
    }

    #[test]
    fn partial_segments_do_not_connect() {
        let memory = InMemorySharedMemory::new();
        memory.publish(PHYSICS_SEGMENT, physics_page(0.5, 2, 0.0));
        let mut source = source(&memory);

        assert!(source.update().is_empty());
        assert!(!source.connected());
    }

    #[test]
    fn connects_and_reads_live_frame() {
        let memory = InMemorySharedMemory::new();
        running_game(&memory, physics_page(0.8, 3, -0.25), 2);
        let mut source = source(&memory);

        let snapshot = source.update();

        assert!(source.connected());
        assert_eq!(snapshot.gear, 2);
        assert!((snapshot.throttle - 0.8).abs() < f32::EPSILON);
        assert!((snapshot.rpm - 6500.0).abs() < f32::EPSILON);
        assert!((snapshot.steering_angle - 0.25).abs() < f32::EPSILON);
        assert!(snapshot.active);
        assert_eq!(
            source.session_info().map(|s| s.track.as_str()),
            Some("spa")
        );
    }

    #[test]
    fn follows_physics_updates() {
        let memory = InMemorySharedMemory::new();
        running_game(&memory, physics_page(0.1, 2, 0.0), 2);
        let mut source = source(&memory);
        assert!((source.update().throttle - 0.1).abs() < f32::EPSILON);

        assert!(memory.write(PHYSICS_SEGMENT, OFF_GAS, &0.9f32.to_le_bytes()));
        assert!((source.update().throttle - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn lost_segment_tears_down_everything() {
        let memory = InMemorySharedMemory::new();
        running_game(&memory, physics_page(0.5, 2, 0.0), 2);
        let mut source = source(&memory);
        assert!(!source.update().is_empty());

        memory.remove(GRAPHICS_SEGMENT);

        assert!(source.update().is_empty());
        assert!(!source.connected());
        assert!(source.session_info().is_none());
    }

    #[test]
    fn recovers_after_game_restart() {
        let memory = InMemorySharedMemory::new();
        running_game(&memory, physics_page(0.5, 2, 0.0), 2);
        let mut source = source(&memory);
        assert!(!source.update().is_empty());
        assert!(source.connected());

        memory.remove(PHYSICS_SEGMENT);
        assert!(source.update().is_empty());

        running_game(&memory, physics_page(0.6, 5, 0.0), 2);
        let snapshot = source.update();
        assert!(source.connected());
        assert_eq!(snapshot.gear, 4);
    }

    #[test]
    fn reconnect_attempts_are_rate_limited() {
        let memory = InMemorySharedMemory::new();
        let mut source = AssettoCorsaSource::with_memory(memory.clone(), DEFAULT_RECONNECT_INTERVAL);

        for _ in 0..500 {
            assert!(source.update().is_empty());
        }

        // One attempt, which stops at the first missing segment.
        assert_eq!(memory.open_calls(), 1);
        assert_eq!(source.reconnect_gate().attempts(), 1);
        assert_eq!(source.reconnect_gate().throttled(), 499);
    }

    #[test]
    fn name_is_stable() {
        assert_eq!(AssettoCorsaSource::new().name(), "Assetto Corsa");
    }
}
