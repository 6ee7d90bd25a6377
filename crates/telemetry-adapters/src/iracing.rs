//! iRacing telemetry source built on the iRacing SDK session model.
//!
//! The SDK exposes a start/teardown handshake, an "is initialized" liveness
//! check and named variable lookups. [`SdkSession`] captures that contract;
//! [`IrsdkSession`] implements it over the `Local\IRSDKMemMapFileName`
//! memory map:
//!
//! - a 112-byte header (`ver`, `status`, `tick_rate`, ..., `num_vars`,
//!   `var_header_offset`, `num_buf`, `buf_len`, `var_buf[4]`);
//! - `num_vars` 144-byte variable headers (`type`, `offset`, `count`, `name[32]`, ...);
//! - up to four rotating data buffers, the newest having the highest tick count.
//!
//! Gear is already `-1 = R, 0 = N`. Clutch and `SteeringWheelAngle` are
//! passed through unchanged; iRacing reports steering in radians, positive
//! counter-clockwise.

use std::collections::HashMap;
use std::time::Duration;

use simhud_telemetry_core::{
    DEFAULT_RECONNECT_INTERVAL, KPH_PER_MPS, ReconnectGate, Snapshot, SourceError,
    TelemetrySource,
};
use tracing::{debug, info, warn};

use crate::decode::{read_f32, read_f64, read_i32, read_latin1_string, require_len};
use crate::shm::{MappedRegion, PlatformSharedMemory, SharedMemory};

pub const IRSDK_MAP_NAME: &str = "Local\\IRSDKMemMapFileName";

const IRSDK_HEADER_SIZE: usize = 112;
const IRSDK_VAR_HEADER_SIZE: usize = 144;
const IRSDK_VAR_BUF_OFFSET: usize = 48;
const IRSDK_VAR_BUF_SIZE: usize = 16;
const IRSDK_MAX_BUFS: usize = 4;
const IRSDK_MAX_VARS: i32 = 4096;
const IRSDK_VAR_NAME_OFFSET: usize = 16;
const IRSDK_VAR_NAME_LEN: usize = 32;
const IRSDK_STATUS_CONNECTED: i32 = 1;

const IRSDK_VAR_TYPE_CHAR: i32 = 0;
const IRSDK_VAR_TYPE_BOOL: i32 = 1;
const IRSDK_VAR_TYPE_INT: i32 = 2;
const IRSDK_VAR_TYPE_BITFIELD: i32 = 3;
const IRSDK_VAR_TYPE_FLOAT: i32 = 4;
const IRSDK_VAR_TYPE_DOUBLE: i32 = 5;

const VAR_THROTTLE: &str = "Throttle";
const VAR_BRAKE: &str = "Brake";
const VAR_CLUTCH: &str = "Clutch";
const VAR_RPM: &str = "RPM";
const VAR_SPEED: &str = "Speed";
const VAR_GEAR: &str = "Gear";
const VAR_STEERING_WHEEL_ANGLE: &str = "SteeringWheelAngle";
const VAR_IS_ON_TRACK: &str = "IsOnTrack";

/// A telemetry variable value as reported by the SDK.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SdkValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Double(f64),
}

impl SdkValue {
    pub fn as_f32(self) -> f32 {
        match self {
            Self::Bool(value) => f32::from(u8::from(value)),
            Self::Int(value) => value as f32,
            Self::Float(value) => value,
            Self::Double(value) => value as f32,
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            Self::Bool(value) => i32::from(value),
            Self::Int(value) => value,
            Self::Float(value) => value as i32,
            Self::Double(value) => value as i32,
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            Self::Bool(value) => value,
            Self::Int(value) => value != 0,
            Self::Float(value) => value.abs() > 0.0,
            Self::Double(value) => value.abs() > 0.0,
        }
    }
}

/// Handshake-style simulator SDK session.
pub trait SdkSession: Send {
    /// Start the session handshake.
    fn startup(&mut self) -> Result<(), SourceError>;

    /// Tear the session down and release its resources.
    fn shutdown(&mut self);

    /// Liveness check. A live session also latches its newest data frame,
    /// which subsequent [`SdkSession::value`] calls read from.
    fn is_initialized(&mut self) -> bool;

    /// Look up a named variable; `None` when the simulator does not publish it.
    fn value(&self, name: &str) -> Option<SdkValue>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct IrsdkVarBuf {
    tick_count: i32,
    buf_offset: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct IrsdkHeader {
    ver: i32,
    status: i32,
    tick_rate: i32,
    session_info_update: i32,
    num_vars: i32,
    var_header_offset: i32,
    num_buf: i32,
    buf_len: i32,
    var_buf: [IrsdkVarBuf; IRSDK_MAX_BUFS],
}

impl IrsdkHeader {
    fn parse(data: &[u8]) -> Result<Self, SourceError> {
        require_len(data, IRSDK_HEADER_SIZE)?;
        let field = |index: usize| read_i32(data, index * 4).unwrap_or(0);

        let mut var_buf = [IrsdkVarBuf::default(); IRSDK_MAX_BUFS];
        for (slot, entry) in var_buf.iter_mut().enumerate() {
            let base = IRSDK_VAR_BUF_OFFSET + slot * IRSDK_VAR_BUF_SIZE;
            *entry = IrsdkVarBuf {
                tick_count: read_i32(data, base).unwrap_or(0),
                buf_offset: read_i32(data, base + 4).unwrap_or(0),
            };
        }

        Ok(Self {
            ver: field(0),
            status: field(1),
            tick_rate: field(2),
            session_info_update: field(3),
            num_vars: field(6),
            var_header_offset: field(7),
            num_buf: field(8),
            buf_len: field(9),
            var_buf,
        })
    }

    fn is_connected(&self) -> bool {
        self.status & IRSDK_STATUS_CONNECTED != 0
    }

    fn layout_signature(&self) -> (i32, i32, i32, i32) {
        (
            self.num_vars,
            self.var_header_offset,
            self.num_buf,
            self.buf_len,
        )
    }
}

fn validate_irsdk_header(header: &IrsdkHeader) -> Result<(), SourceError> {
    let num_buf = usize::try_from(header.num_buf).unwrap_or(0);
    if num_buf == 0 || num_buf > IRSDK_MAX_BUFS {
        return Err(SourceError::Decode(format!(
            "IRSDK header reports invalid buffer count: {}",
            header.num_buf
        )));
    }
    if header.buf_len <= 0 {
        return Err(SourceError::Decode(format!(
            "IRSDK header reports invalid buffer length: {}",
            header.buf_len
        )));
    }
    if header.num_vars <= 0 || header.num_vars > IRSDK_MAX_VARS {
        return Err(SourceError::Decode(format!(
            "IRSDK header reports invalid variable count: {}",
            header.num_vars
        )));
    }
    if header.var_header_offset < 0 {
        return Err(SourceError::Decode(format!(
            "IRSDK header reports negative variable header offset: {}",
            header.var_header_offset
        )));
    }
    Ok(())
}

fn select_latest_var_buffer(header: &IrsdkHeader) -> Option<IrsdkVarBuf> {
    let num_buf = usize::try_from(header.num_buf).ok()?;
    let mut candidates = header.var_buf.get(..num_buf)?.iter().copied();
    let first = candidates.next()?;
    Some(candidates.fold(first, |best, candidate| {
        if candidate.tick_count > best.tick_count {
            candidate
        } else {
            best
        }
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VarBinding {
    var_type: i32,
    offset: usize,
}

fn irsdk_var_type_size(var_type: i32) -> Option<usize> {
    Some(match var_type {
        IRSDK_VAR_TYPE_CHAR | IRSDK_VAR_TYPE_BOOL => 1,
        IRSDK_VAR_TYPE_INT | IRSDK_VAR_TYPE_BITFIELD | IRSDK_VAR_TYPE_FLOAT => 4,
        IRSDK_VAR_TYPE_DOUBLE => 8,
        _ => return None,
    })
}

/// Parse one variable header, skipping entries that fall outside the buffer.
fn parse_var_header(entry: &[u8], buf_len: usize) -> Option<(String, VarBinding)> {
    let var_type = read_i32(entry, 0)?;
    let offset = usize::try_from(read_i32(entry, 4)?).ok()?;
    let count = usize::try_from(read_i32(entry, 8)?).ok()?;
    if count == 0 {
        return None;
    }

    let byte_len = irsdk_var_type_size(var_type)?.checked_mul(count)?;
    if offset.checked_add(byte_len)? > buf_len {
        return None;
    }

    let name_end = IRSDK_VAR_NAME_OFFSET + IRSDK_VAR_NAME_LEN;
    let name = read_latin1_string(entry.get(IRSDK_VAR_NAME_OFFSET..name_end)?);
    if name.is_empty() {
        return None;
    }

    Some((name.to_ascii_lowercase(), VarBinding { var_type, offset }))
}

fn read_var(frame: &[u8], binding: VarBinding) -> Option<SdkValue> {
    match binding.var_type {
        IRSDK_VAR_TYPE_CHAR => frame
            .get(binding.offset)
            .map(|&b| SdkValue::Int(i32::from(b))),
        IRSDK_VAR_TYPE_BOOL => frame.get(binding.offset).map(|&b| SdkValue::Bool(b != 0)),
        IRSDK_VAR_TYPE_INT | IRSDK_VAR_TYPE_BITFIELD => {
            read_i32(frame, binding.offset).map(SdkValue::Int)
        }
        IRSDK_VAR_TYPE_FLOAT => read_f32(frame, binding.offset).map(SdkValue::Float),
        IRSDK_VAR_TYPE_DOUBLE => read_f64(frame, binding.offset).map(SdkValue::Double),
        _ => None,
    }
}

fn read_header(region: &dyn MappedRegion) -> Result<IrsdkHeader, SourceError> {
    let mut buf = [0u8; IRSDK_HEADER_SIZE];
    region.read_at(0, &mut buf)?;
    IrsdkHeader::parse(&buf)
}

fn to_usize(value: i32, what: &str) -> Result<usize, SourceError> {
    usize::try_from(value)
        .map_err(|error| SourceError::Decode(format!("invalid IRSDK {what} {value}: {error}")))
}

fn build_bindings(
    region: &dyn MappedRegion,
    header: &IrsdkHeader,
) -> Result<HashMap<String, VarBinding>, SourceError> {
    let num_vars = to_usize(header.num_vars, "variable count")?;
    let var_header_offset = to_usize(header.var_header_offset, "variable header offset")?;
    let buf_len = to_usize(header.buf_len, "buffer length")?;

    let table_len = num_vars
        .checked_mul(IRSDK_VAR_HEADER_SIZE)
        .ok_or_else(|| SourceError::Decode("IRSDK variable table overflow".to_string()))?;
    let mut table = vec![0u8; table_len];
    region.read_at(var_header_offset, &mut table)?;

    Ok(table
        .chunks_exact(IRSDK_VAR_HEADER_SIZE)
        .filter_map(|entry| parse_var_header(entry, buf_len))
        .collect())
}

/// [`SdkSession`] over the iRacing SDK memory map.
pub struct IrsdkSession<S: SharedMemory = PlatformSharedMemory> {
    memory: S,
    region: Option<Box<dyn MappedRegion>>,
    bindings: HashMap<String, VarBinding>,
    signature: Option<(i32, i32, i32, i32)>,
    frame: Vec<u8>,
    tick_count: Option<i32>,
}

impl Default for IrsdkSession {
    fn default() -> Self {
        Self::new(PlatformSharedMemory)
    }
}

impl<S: SharedMemory> IrsdkSession<S> {
    pub fn new(memory: S) -> Self {
        Self {
            memory,
            region: None,
            bindings: HashMap::new(),
            signature: None,
            frame: Vec::new(),
            tick_count: None,
        }
    }

    /// Tick count of the latched frame.
    pub fn tick_count(&self) -> Option<i32> {
        self.tick_count
    }

    pub fn variable_count(&self) -> usize {
        self.bindings.len()
    }

    fn refresh(&mut self) -> Result<(), SourceError> {
        let region = self.region.as_deref().ok_or(SourceError::SessionClosed)?;
        let header = read_header(region)?;
        if !header.is_connected() {
            return Err(SourceError::SessionClosed);
        }
        validate_irsdk_header(&header)?;

        if self.signature != Some(header.layout_signature()) {
            debug!(
                num_vars = header.num_vars,
                buf_len = header.buf_len,
                "IRSDK layout changed; rebuilding variable bindings"
            );
            self.bindings = build_bindings(region, &header)?;
            self.signature = Some(header.layout_signature());
        }

        let latest = select_latest_var_buffer(&header)
            .ok_or_else(|| SourceError::Decode("IRSDK header has no data buffer".to_string()))?;
        let offset = to_usize(latest.buf_offset, "buffer offset")?;
        let buf_len = to_usize(header.buf_len, "buffer length")?;

        self.frame.resize(buf_len, 0);
        region.read_at(offset, &mut self.frame)?;
        self.tick_count = Some(latest.tick_count);
        Ok(())
    }
}

impl<S: SharedMemory> SdkSession for IrsdkSession<S> {
    fn startup(&mut self) -> Result<(), SourceError> {
        self.shutdown();

        // The map size varies across SDK releases, so only the header is required up front.
        let region = self.memory.open(IRSDK_MAP_NAME, IRSDK_HEADER_SIZE)?;
        let header = read_header(region.as_ref())?;
        if !header.is_connected() {
            return Err(SourceError::SessionClosed);
        }
        validate_irsdk_header(&header)?;

        self.bindings = build_bindings(region.as_ref(), &header)?;
        self.signature = Some(header.layout_signature());
        self.region = Some(region);

        debug!(
            version = header.ver,
            tick_rate = header.tick_rate,
            session_info_update = header.session_info_update,
            vars = self.bindings.len(),
            "IRSDK session started"
        );
        Ok(())
    }

    fn shutdown(&mut self) {
        self.region = None;
        self.bindings.clear();
        self.signature = None;
        self.frame.clear();
        self.tick_count = None;
    }

    fn is_initialized(&mut self) -> bool {
        match self.refresh() {
            Ok(()) => true,
            Err(error) => {
                debug!(error = %error, "IRSDK session is no longer initialized");
                false
            }
        }
    }

    fn value(&self, name: &str) -> Option<SdkValue> {
        if self.tick_count.is_none() {
            return None;
        }
        let binding = self.bindings.get(&name.to_ascii_lowercase())?;
        read_var(&self.frame, *binding)
    }
}

/// iRacing telemetry source.
pub struct IRacingSource<T: SdkSession = IrsdkSession> {
    session: T,
    started: bool,
    gate: ReconnectGate,
}

impl Default for IRacingSource {
    fn default() -> Self {
        Self::new()
    }
}

impl IRacingSource {
    pub fn new() -> Self {
        Self::with_session(IrsdkSession::default(), DEFAULT_RECONNECT_INTERVAL)
    }
}

impl<T: SdkSession> IRacingSource<T> {
    pub fn with_session(session: T, reconnect_interval: Duration) -> Self {
        Self {
            session,
            started: false,
            gate: ReconnectGate::new(reconnect_interval),
        }
    }

    pub fn session(&self) -> &T {
        &self.session
    }

    pub fn reconnect_gate(&self) -> &ReconnectGate {
        &self.gate
    }

    fn float(&self, name: &str) -> f32 {
        self.session.value(name).map_or(0.0, SdkValue::as_f32)
    }

    fn read_snapshot(&self) -> Snapshot {
        let gear = self.session.value(VAR_GEAR).map_or(0, SdkValue::as_i32);
        Snapshot::builder()
            .throttle(self.float(VAR_THROTTLE))
            .brake(self.float(VAR_BRAKE))
            .clutch(self.float(VAR_CLUTCH))
            .rpm(self.float(VAR_RPM))
            .speed_kph(self.float(VAR_SPEED) * KPH_PER_MPS)
            .gear(i8::try_from(gear).unwrap_or(0))
            .steering_angle(self.float(VAR_STEERING_WHEEL_ANGLE))
            .active(
                self.session
                    .value(VAR_IS_ON_TRACK)
                    .is_some_and(SdkValue::as_bool),
            )
            .build()
    }
}

impl<T: SdkSession> TelemetrySource for IRacingSource<T> {
    fn update(&mut self) -> Snapshot {
        if !self.started {
            if !self.gate.try_acquire() {
                return Snapshot::EMPTY;
            }
            match self.session.startup() {
                Ok(()) => {
                    info!("Connected to iRacing SDK session");
                    self.started = true;
                }
                Err(error) => {
                    if error.is_expected() {
                        debug!(error = %error, "iRacing SDK unavailable");
                    } else {
                        warn!(error = %error, "Failed to start iRacing SDK session");
                    }
                    self.session.shutdown();
                    return Snapshot::EMPTY;
                }
            }
        }

        if !self.session.is_initialized() {
            info!("iRacing SDK session ended");
            self.session.shutdown();
            self.started = false;
            return Snapshot::EMPTY;
        }

        self.read_snapshot()
    }

    fn name(&self) -> &str {
        "iRacing"
    }

    fn connected(&self) -> bool {
        self.started
    }
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn header_parse_no_panic_on_arbitrary(
            data in proptest::collection::vec(any::<u8>(), 0..256)
        ) {
            if let Ok(header) = IrsdkHeader::parse(&data) {
                let _ = validate_irsdk_header(&header);
                let _ = select_latest_var_buffer(&header);
            }
        }

        #[test]
        fn var_header_parse_no_panic_on_arbitrary(
            entry in proptest::collection::vec(any::<u8>(), 0..200),
            buf_len in 0usize..4096,
        ) {
            let _ = parse_var_header(&entry, buf_len);
        }
    }
}
