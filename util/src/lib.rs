//! # Cockpit utilities
//!
//! Functionality shared by the cockpit crates which has nothing to do with the vehicle itself:
//! run sessions and logging, parameter files, timing.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Location of the cockpit's files on the host
pub mod host;

/// Logging to the terminal and the session log file
pub mod logger;

/// Interface of cyclically processed modules
pub mod module;

/// TOML parameter file loading
pub mod params;

/// Run sessions and the session epoch
pub mod session;

/// Time conversions
pub mod time;

/// Fixed period timer thread
pub mod timer;
