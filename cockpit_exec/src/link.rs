//! # Connection cycle tracking
//!
//! The transport reports whether it is connected to the vehicle. [`LinkWatch`] turns those
//! readings into connect and disconnect edges, each disconnect ending a connection cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{info, warn};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Period at which the connection state is polled, in milliseconds.
pub const LINK_POLL_PERIOD_MS: u64 = 500;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct LinkWatch {
    /// Last reading, `None` before the first one.
    connected: Option<bool>,

    /// Number of completed connection cycles.
    cycles: u32,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkChange {
    Connected,
    Disconnected,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LinkWatch {
    /// Record a connection reading, returning the change it makes if any.
    ///
    /// Being disconnected at the first reading is not a change, there was no cycle to end.
    pub fn update(&mut self, connected: bool) -> Option<LinkChange> {
        let previous = self.connected.replace(connected);

        match (previous, connected) {
            (Some(true), true) | (Some(false), false) | (None, false) => None,
            (_, true) => {
                info!("Vehicle link up");
                Some(LinkChange::Connected)
            },
            (Some(true), false) => {
                self.cycles += 1;
                warn!("Vehicle link down after {} connection cycle(s)", self.cycles);
                Some(LinkChange::Disconnected)
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.unwrap_or(false)
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
