//! # Cockpit library.
//!
//! This library allows other crates in the workspace to access the components of the cockpit
//! executable.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Control command generator - turns key events into the vehicle's control targets
pub mod control;

/// Events emitted by the components for display to the operator
pub mod event;

/// Connection cycle tracking
pub mod link;

/// Executable parameters
pub mod params;

/// Recording session manager - starts and stops the vehicle's video recording
pub mod record;

/// Telemetry mirror - keeps and formats the vehicle's housekeeping telemetry
pub mod telemetry;

/// Vehicle link - provisions the vehicle and drives its auxiliary controls
pub mod vehicle;
