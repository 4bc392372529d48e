//! Lever mixing and zero-command debounce

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::convert::Infallible;
use serde::Serialize;

use comms_if::trident::ControlTarget;
use util::module::State;

use super::{CtrlGenError, LeverState, Setpoint};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of consecutive zero ticks at which publication is suppressed.
pub const ZERO_DEBOUNCE_TICKS: u32 = 2;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Turns lever positions into the setpoint to publish on each tick.
///
/// A zero setpoint is published once after the levers return to neutral, after which nothing is
/// published until a lever moves again.
#[derive(Debug, Default)]
pub struct Mixer {
    actuator_id: String,

    zero_count: u32,
}

/// Status report for one mixer tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MixerReport {
    /// Setpoint derived from the levers on this tick.
    pub setpoint: Setpoint,

    /// Consecutive zero ticks including this one.
    pub zero_count: u32,

    /// True if publication was suppressed on this tick.
    pub suppressed: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for Mixer {
    type InitData = String;
    type InitError = CtrlGenError;

    type InputData = LeverState;
    type OutputData = Option<ControlTarget>;
    type StatusReport = MixerReport;
    type ProcError = Infallible;

    /// Initialise the mixer with the actuator id to tag setpoints with.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        if init_data.is_empty() {
            return Err(CtrlGenError::EmptyActuatorId)
        }

        self.actuator_id = init_data;
        self.zero_count = 0;

        Ok(())
    }

    /// Mix the levers, returning the control target to publish if there is one.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let setpoint = input_data.setpoint();

        if setpoint.is_zero() {
            self.zero_count = self.zero_count.saturating_add(1);
        }
        else {
            self.zero_count = 0;
        }

        let suppressed = self.zero_count >= ZERO_DEBOUNCE_TICKS;

        let report = MixerReport {
            setpoint,
            zero_count: self.zero_count,
            suppressed
        };

        let output = match suppressed {
            true => None,
            false => Some(setpoint.to_control_target(&self.actuator_id))
        };

        Ok((output, report))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
