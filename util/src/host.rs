//! Host platform utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::env;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Environment variable pointing at the root of the motion control software
/// checkout. Parameter files and session directories are found relative to it.
pub const SW_ROOT_ENV_VAR: &str = "MOTION_SW_ROOT";

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the software root directory from the environment.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}

/// Short description of the host, used in the startup banner of executables.
pub fn get_platform() -> String {
    format!("{} ({})", env::consts::OS, env::consts::ARCH)
}
