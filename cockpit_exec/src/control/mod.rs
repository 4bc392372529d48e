//! # Control command generator
//!
//! Turns the operator's key events into the stream of control targets sent to the vehicle.
//!
//! Key events move a set of [`Lever`]s. While enabled, a [`PeriodicTimer`](util::timer::PeriodicTimer)
//! samples the levers, the [`Mixer`] derives the setpoint and debounces the stop command, and the
//! resulting [`ControlTarget`](comms_if::trident::ControlTarget) is published on the transport.
//! The generator also tracks the operator selected [`MotorSpeed`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod lever;
mod mixer;
mod params;
mod speed;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use lever::*;
pub use mixer::*;
pub use params::*;
pub use speed::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur in the control command generator.
#[derive(Debug, thiserror::Error)]
pub enum CtrlGenError {
    #[error("The actuator ID of the control generator cannot be empty")]
    EmptyActuatorId,

    #[error("Could not start the dispatch timer: {0}")]
    TimerError(util::timer::TimerError),
}
