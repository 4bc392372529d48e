//! # Communications interface crate.
//!
//! Provides the messages exchanged with the vehicle and the transport used to exchange them.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Topic and message definitions for the Trident vehicle
pub mod trident;

/// Network module
pub mod net;
