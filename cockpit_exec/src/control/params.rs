//! Parameters structure for the control command generator

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::time::Duration;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the control command generator.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// Period between two control target dispatches.
    ///
    /// Units: milliseconds
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,

    /// Actuator identifier every control target is tagged with.
    #[serde(default = "default_actuator_id")]
    pub actuator_id: String,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            actuator_id: default_actuator_id()
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_period_ms() -> u64 {
    250
}

fn default_actuator_id() -> String {
    "control".into()
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
