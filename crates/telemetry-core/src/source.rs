use crate::{SessionInfo, Snapshot};

/// A pollable provider of normalized telemetry.
///
/// `update` is the only mutating entry point. On every call it must:
///
/// - try to (re)connect when disconnected, honouring its own rate limit;
/// - when connected, decode the newest data into a populated [`Snapshot`];
/// - on any failure, release held resources, report `connected() == false`
///   and return [`Snapshot::EMPTY`].
///
/// Errors never escape `update`. Callers observe failure only through the
/// returned snapshot and [`TelemetrySource::connected`].
pub trait TelemetrySource: Send {
    fn update(&mut self) -> Snapshot;

    fn name(&self) -> &str;

    fn connected(&self) -> bool;

    /// Static session metadata captured on the current connection.
    fn session_info(&self) -> Option<&SessionInfo> {
        None
    }
}

impl<T: TelemetrySource + ?Sized> TelemetrySource for Box<T> {
    fn update(&mut self) -> Snapshot {
        (**self).update()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn connected(&self) -> bool {
        (**self).connected()
    }

    fn session_info(&self) -> Option<&SessionInfo> {
        (**self).session_info()
    }
}
