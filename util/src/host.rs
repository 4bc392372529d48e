//! Host platform utility functions

use std::{env, path::PathBuf};

/// Environment variable holding the root directory of the cockpit software.
pub const COCKPIT_ROOT_ENV_VAR: &str = "TRIDENT_COCKPIT_ROOT";

/// Get the root directory of the cockpit software, under which the `params` and `sessions`
/// directories live.
pub fn get_cockpit_root() -> Result<PathBuf, env::VarError> {
    env::var(COCKPIT_ROOT_ENV_VAR).map(PathBuf::from)
}
