//! # Cockpit Executable Parameters
//!
//! This module provides the parameters for the cockpit executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use comms_if::net::NetParams;

use crate::{control, vehicle::Preferences};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CockpitExecParams {
    /// Endpoints of the vehicle's publish/subscribe bus
    pub net: NetParams,

    /// Control command generator parameters
    #[serde(default)]
    pub ctrl: control::Params,

    /// Operator preferences applied to the vehicle on connection
    #[serde(default)]
    pub prefs: Preferences,
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_load_minimal() {
        let p: CockpitExecParams = util::params::from_toml_str(r#"
            [net]
            pub_endpoint = "tcp://192.168.2.2:5550"
            sub_endpoint = "tcp://192.168.2.2:5551"
        "#).unwrap();

        assert_eq!(p.net.recv_timeout_ms, 100);
        assert_eq!(p.ctrl.period_ms, 250);
        assert_eq!(p.ctrl.actuator_id, "control");
        assert_eq!(p.prefs, Preferences::default());
    }

    #[test]
    fn test_missing_net_rejected() {
        assert!(util::params::from_toml_str::<CockpitExecParams>("[prefs]\nstabilise = true").is_err());
    }
}
