//! Normalized vehicle state delivered once per engine tick.

use serde::{Deserialize, Serialize};

use crate::KPH_PER_MPS;

/// One normalized telemetry sample.
///
/// Pedals are in `0.0..=1.0`, `rpm` and `speed_kph` are never negative and
/// every float is finite. Values built through [`Snapshot::builder`] always
/// hold these invariants regardless of what the simulator reported.
///
/// `steering_angle` is in radians, zero at centre. Its sign follows the
/// producing source (see each adapter's documentation).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub throttle: f32,
    pub brake: f32,
    pub clutch: f32,
    pub rpm: f32,
    pub speed_kph: f32,
    /// `-1` reverse, `0` neutral, `1..N` forward.
    pub gear: i8,
    pub steering_angle: f32,
    /// Vehicle is live on track (not in menus, replays or paused).
    pub active: bool,
}

impl Snapshot {
    /// The "no data" sample returned by disconnected sources.
    pub const EMPTY: Snapshot = Snapshot {
        throttle: 0.0,
        brake: 0.0,
        clutch: 0.0,
        rpm: 0.0,
        speed_kph: 0.0,
        gear: 0,
        steering_angle: 0.0,
        active: false,
    };

    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    pub fn speed_mps(&self) -> f32 {
        self.speed_kph / KPH_PER_MPS
    }

    /// Dashboard label for the current gear (`R`, `N`, `1`, `2`, ...).
    pub fn gear_label(&self) -> String {
        match self.gear {
            g if g < 0 => "R".to_string(),
            0 => "N".to_string(),
            g => g.to_string(),
        }
    }
}

/// Builder that sanitizes raw simulator values into a valid [`Snapshot`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotBuilder {
    throttle: f32,
    brake: f32,
    clutch: f32,
    rpm: f32,
    speed_kph: f32,
    gear: i8,
    steering_angle: f32,
    active: bool,
}

impl SnapshotBuilder {
    pub fn throttle(mut self, value: f32) -> Self {
        self.throttle = value;
        self
    }

    pub fn brake(mut self, value: f32) -> Self {
        self.brake = value;
        self
    }

    pub fn clutch(mut self, value: f32) -> Self {
        self.clutch = value;
        self
    }

    pub fn rpm(mut self, value: f32) -> Self {
        self.rpm = value;
        self
    }

    pub fn speed_kph(mut self, value: f32) -> Self {
        self.speed_kph = value;
        self
    }

    pub fn gear(mut self, value: i8) -> Self {
        self.gear = value;
        self
    }

    pub fn steering_angle(mut self, value: f32) -> Self {
        self.steering_angle = value;
        self
    }

    pub fn active(mut self, value: bool) -> Self {
        self.active = value;
        self
    }

    pub fn build(self) -> Snapshot {
        Snapshot {
            throttle: unit(self.throttle),
            brake: unit(self.brake),
            clutch: unit(self.clutch),
            rpm: non_negative(self.rpm),
            speed_kph: non_negative(self.speed_kph),
            gear: self.gear,
            steering_angle: if self.steering_angle.is_finite() {
                self.steering_angle
            } else {
                0.0
            },
            active: self.active,
        }
    }
}

fn unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn non_negative(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn default_is_empty() {
        assert!(Snapshot::default().is_empty());
        assert_eq!(Snapshot::default(), Snapshot::EMPTY);
    }

    #[test]
    fn builder_clamps_pedals() {
        let snapshot = Snapshot::builder()
            .throttle(1.7)
            .brake(-0.4)
            .clutch(0.25)
            .build();

        assert!((snapshot.throttle - 1.0).abs() < f32::EPSILON);
        assert!(snapshot.brake.abs() < f32::EPSILON);
        assert!((snapshot.clutch - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn builder_floors_rpm_and_speed() {
        let snapshot = Snapshot::builder().rpm(-50.0).speed_kph(-3.0).build();
        assert!(snapshot.rpm.abs() < f32::EPSILON);
        assert!(snapshot.speed_kph.abs() < f32::EPSILON);
    }

    #[test]
    fn builder_discards_non_finite_values() {
        let snapshot = Snapshot::builder()
            .throttle(f32::NAN)
            .rpm(f32::INFINITY)
            .steering_angle(f32::NEG_INFINITY)
            .build();

        assert!(snapshot.throttle.abs() < f32::EPSILON);
        assert!(snapshot.rpm.abs() < f32::EPSILON);
        assert!(snapshot.steering_angle.abs() < f32::EPSILON);
    }

    #[test]
    fn steering_keeps_sign() {
        let snapshot = Snapshot::builder().steering_angle(-0.35).build();
        assert!((snapshot.steering_angle + 0.35).abs() < f32::EPSILON);
    }

    #[test]
    fn speed_conversion() {
        let snapshot = Snapshot::builder().speed_kph(180.0).build();
        assert!((snapshot.speed_mps() - 50.0).abs() < 0.001);
    }

    #[test]
    fn gear_labels() {
        let label = |gear| Snapshot::builder().gear(gear).build().gear_label();
        assert_eq!(label(-1), "R");
        assert_eq!(label(0), "N");
        assert_eq!(label(4), "4");
    }

    #[test]
    fn json_shape() -> TestResult {
        let snapshot = Snapshot::builder()
            .throttle(0.5)
            .gear(3)
            .active(true)
            .build();
        let value = serde_json::to_value(snapshot)?;

        assert_eq!(value["gear"], 3);
        assert_eq!(value["active"], true);
        let decoded: Snapshot = serde_json::from_value(value)?;
        assert_eq!(decoded, snapshot);
        Ok(())
    }
}
