use serde::{Deserialize, Serialize};

/// Static metadata a simulator publishes once per session.
///
/// Sources capture this when a connection is established and drop it on
/// disconnect, so a present value always describes the live session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionInfo {
    pub simulator_version: String,
    pub interface_version: String,
    pub car_model: String,
    pub track: String,
    pub player_name: String,
    pub player_nick: String,
    pub session_count: i32,
    pub car_count: i32,
    pub sector_count: i32,
    pub max_rpm: f32,
    pub max_fuel: f32,
    pub max_torque: f32,
    pub max_power: f32,
}
