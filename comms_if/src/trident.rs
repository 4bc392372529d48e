//! # Trident vehicle messages
//!
//! Message and topic definitions for everything the cockpit exchanges with the vehicle. All
//! messages are serialised as JSON on the wire.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Battery time-to-empty value reported by the fuel gauge while the vehicle is charging.
pub const BATTERY_CHARGING_SENTINEL_MINS: i32 = 65535;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Control setpoint for the vehicle's thrusters.
///
/// All axes are normalised to `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlTarget {
    /// Logical identifier of the actuator source, e.g. `"control"`.
    pub id: String,

    /// Pitch demand, positive nose down.
    pub pitch: f32,

    /// Yaw demand, positive to the right.
    pub yaw: f32,

    /// Thrust demand, positive forwards.
    pub thrust: f32,

    /// Lift demand, positive upwards.
    pub lift: f32,
}

/// A request to, or response from, the vehicle's video recording service.
///
/// Requests are sent on [`Topic::VidSessionReq`] with `response` set to
/// [`VideoSessionResponse::Unknown`], the vehicle answers on [`Topic::VidSessionRep`] with the
/// same structure and the response filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSessionCommand {
    /// Lowercase hyphenated UUID of the session, may be empty.
    pub session_id: String,

    /// JSON encoded session metadata, empty for stop requests.
    pub metadata: String,

    /// The requested session state.
    pub request: VideoSessionState,

    /// The vehicle's response to the request.
    pub response: VideoSessionResponse,

    /// Free text reason accompanying the response.
    pub reason: String,
}

/// The vehicle's report of its current recording session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSession {
    pub session_id: String,

    pub state: VideoSessionState,

    /// Total duration of the session so far.
    ///
    /// Units: seconds
    pub total_duration_s: u32,
}

/// Announcement of a vehicle on the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beacon {
    /// Unique identifier of the vehicle.
    pub uuid: String,

    /// Network address the vehicle announced itself from.
    #[serde(default)]
    pub address: String,
}

/// Power of one of the vehicle's lights, used for both requests and reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightPower {
    /// Light identifier, the forward light is `"fwd"`.
    pub id: String,

    /// Power between 0 (off) and 1 (full).
    pub power: f32,
}

/// State of one of the vehicle's onboard controllers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub vehicle_id: String,

    pub controller_id: ControllerId,

    pub state: ControllerState,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Depth {
    /// Units: meters
    pub depth: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterTemperature {
    /// Units: degrees celsius
    pub temperature: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuelgaugeHealth {
    /// Average time to empty, or [`BATTERY_CHARGING_SENTINEL_MINS`] while charging.
    ///
    /// Units: minutes
    pub average_time_to_empty_mins: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordingStats {
    /// Estimated recording time left on the vehicle's storage.
    ///
    /// Units: seconds
    pub est_remaining_rec_time_s: u32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Topics exchanged with the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    ControlTarget,
    VidSessionReq,
    VidSessionRep,
    VidSessionCurrent,
    Beacon,
    Datetime,
    VideoOverlayModeCommand,
    VideoOverlayModeCurrent,
    LightPowerRequested,
    LightPowerCurrent,
    ControllerStateRequested,
    ControllerStateCurrent,
    Depth,
    TempWater,
    FuelgaugeHealth,
    RecordingStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoSessionState {
    Unknown,
    Recording,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoSessionResponse {
    Unknown,
    Accepted,
    RejectedGeneric,
    RejectedInvalidSession,
    RejectedSessionInProgress,
    RejectedNoSpace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerId {
    Trident,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Enabled,
    Disabled,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Topic {
    /// All known topics.
    pub const ALL: [Topic; 16] = [
        Topic::ControlTarget,
        Topic::VidSessionReq,
        Topic::VidSessionRep,
        Topic::VidSessionCurrent,
        Topic::Beacon,
        Topic::Datetime,
        Topic::VideoOverlayModeCommand,
        Topic::VideoOverlayModeCurrent,
        Topic::LightPowerRequested,
        Topic::LightPowerCurrent,
        Topic::ControllerStateRequested,
        Topic::ControllerStateCurrent,
        Topic::Depth,
        Topic::TempWater,
        Topic::FuelgaugeHealth,
        Topic::RecordingStats,
    ];

    /// The name of the topic on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Topic::ControlTarget => "rov_control_target",
            Topic::VidSessionReq => "rov_vid_session_req",
            Topic::VidSessionRep => "rov_vid_session_rep",
            Topic::VidSessionCurrent => "rov_vid_session_current",
            Topic::Beacon => "rov_beacon",
            Topic::Datetime => "rov_datetime",
            Topic::VideoOverlayModeCommand => "rov_video_overlay_mode_command",
            Topic::VideoOverlayModeCurrent => "rov_video_overlay_mode_current",
            Topic::LightPowerRequested => "rov_light_power_requested",
            Topic::LightPowerCurrent => "rov_light_power_current",
            Topic::ControllerStateRequested => "rov_controller_state_requested",
            Topic::ControllerStateCurrent => "rov_controller_state_current",
            Topic::Depth => "rov_depth",
            Topic::TempWater => "rov_temp_water",
            Topic::FuelgaugeHealth => "rov_fuelgauge_health",
            Topic::RecordingStats => "rov_recording_stats",
        }
    }

    /// Find the topic with the given wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl VideoSessionResponse {
    /// True if this is one of the rejection responses.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            VideoSessionResponse::RejectedGeneric
                | VideoSessionResponse::RejectedInvalidSession
                | VideoSessionResponse::RejectedSessionInProgress
                | VideoSessionResponse::RejectedNoSpace
        )
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_topic_names_unique() {
        for t in Topic::ALL.iter() {
            assert_eq!(Topic::from_name(t.name()), Some(*t));
        }
        assert_eq!(Topic::from_name("rov_unknown"), None);
    }

    #[test]
    fn test_session_command_wire_format() {
        let json = r#"{
            "session_id": "",
            "metadata": "",
            "request": "stopped",
            "response": "rejected_session_in_progress",
            "reason": "busy"
        }"#;

        let cmd: VideoSessionCommand = serde_json::from_str(json).unwrap();
        assert_eq!(cmd.request, VideoSessionState::Stopped);
        assert_eq!(cmd.response, VideoSessionResponse::RejectedSessionInProgress);
        assert!(cmd.response.is_rejection());
        assert!(!VideoSessionResponse::Accepted.is_rejection());
    }

    #[test]
    fn test_beacon_address_optional() {
        let beacon: Beacon = serde_json::from_str(r#"{"uuid": "trident-1234"}"#).unwrap();
        assert_eq!(beacon.uuid, "trident-1234");
        assert!(beacon.address.is_empty());
    }
}
