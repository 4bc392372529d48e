//! # Cockpit events
//!
//! Notifications emitted by the cockpit's components after each change in their state, for the
//! presentation layer to display.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Mutex, PoisonError, mpsc::{self, Receiver, Sender}};
use log::trace;

use crate::{
    control::MotorSpeed,
    record::{RecordingState, RejectReason},
    telemetry::{self, TelemetryUpdate},
    vehicle::VehicleContext
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Sending end of the event channel shared by the components.
///
/// Cloning the sink gives another sender on the same channel.
#[derive(Debug)]
pub struct EventSink {
    sender: Mutex<Option<Sender<CockpitEvent>>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum CockpitEvent {
    /// The selected motor speed changed, `None` meaning not engaged.
    MotorSpeedChanged(Option<MotorSpeed>),

    /// The recording state changed.
    ///
    /// `elapsed_s` is the vehicle reported session duration while recording.
    RecordingStateChanged {
        state: RecordingState,
        elapsed_s: Option<u32>,
    },

    /// A recording request was rejected by the vehicle.
    RecordingRejected {
        reason: RejectReason,
        message: String,
    },

    /// A vehicle was found and provisioned.
    VehicleProvisioned(VehicleContext),

    LightChanged(bool),

    StabiliseChanged(bool),

    OverlayChanged(bool),

    Telemetry(TelemetryUpdate),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl EventSink {
    /// Create a new sink and the receiver its events are delivered to.
    pub fn channel() -> (Self, Receiver<CockpitEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { sender: Mutex::new(Some(tx)) }, rx)
    }

    /// A sink which discards all events.
    pub fn discard() -> Self {
        Self { sender: Mutex::new(None) }
    }

    /// Emit an event. Events sent after the receiver has been dropped are discarded.
    pub fn emit(&self, event: CockpitEvent) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(tx) = sender.as_ref() {
            if tx.send(event).is_err() {
                trace!("Event receiver disconnected, event discarded");
            }
        }
    }
}

impl Clone for EventSink {
    fn clone(&self) -> Self {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        Self { sender: Mutex::new(sender.clone()) }
    }
}

impl std::fmt::Display for CockpitEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CockpitEvent::MotorSpeedChanged(Some(s)) => write!(f, "Motor speed {}", s),
            CockpitEvent::MotorSpeedChanged(None) => write!(f, "Motors disengaged"),
            CockpitEvent::RecordingStateChanged { state, elapsed_s: Some(s) } =>
                write!(f, "Recording {} ({})", state, telemetry::format_duration(*s)),
            CockpitEvent::RecordingStateChanged { state, elapsed_s: None } =>
                write!(f, "Recording {}", state),
            CockpitEvent::RecordingRejected { message, .. } =>
                write!(f, "Recording rejected: {}", message),
            CockpitEvent::VehicleProvisioned(ctx) =>
                write!(f, "Connected to vehicle {} at {}", ctx.vehicle_id, ctx.address),
            CockpitEvent::LightChanged(on) => write!(f, "Light {}", on_off(*on)),
            CockpitEvent::StabiliseChanged(on) => write!(f, "Stabilisation {}", on_off(*on)),
            CockpitEvent::OverlayChanged(on) => write!(f, "Video overlay {}", on_off(*on)),
            CockpitEvent::Telemetry(t) => write!(f, "{}", t),
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (sink, rx) = EventSink::channel();
        let other = sink.clone();

        sink.emit(CockpitEvent::LightChanged(true));
        other.emit(CockpitEvent::LightChanged(false));
        assert_eq!(rx.try_iter().count(), 2);

        drop(rx);
        sink.emit(CockpitEvent::LightChanged(true));

        EventSink::discard().emit(CockpitEvent::OverlayChanged(true));
    }

    #[test]
    fn test_display() {
        let e = CockpitEvent::RecordingStateChanged {
            state: RecordingState::Recording,
            elapsed_s: Some(3725)
        };
        assert_eq!(e.to_string(), "Recording recording (01:02:05)");

        let e = CockpitEvent::RecordingRejected {
            reason: RejectReason::NoSpace,
            message: RejectReason::NoSpace.message().into()
        };
        assert_eq!(e.to_string(), "Recording rejected: No space left");

        assert_eq!(
            CockpitEvent::Telemetry(TelemetryUpdate::BatteryTime(65535)).to_string(),
            "battery charging"
        );
        assert_eq!(CockpitEvent::MotorSpeedChanged(None).to_string(), "Motors disengaged");
    }
}
