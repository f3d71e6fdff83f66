//! Controller parameters
//!
//! Each controller has a parameter struct which is loaded from a TOML file 
//! under the parameters directory using `util::params::load`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::MotionCtrlError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains of a single PID controller
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct PidGains {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,
}

/// Parameters for the path following controller
#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
pub struct PathFollowParams {
    /// Heading error gain
    pub k_ang: f64,

    /// Lateral (distance) error gain
    pub k_lin: f64,
}

/// Parameters for the trajectory controller
#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
pub struct TrajParams {
    /// Position error gain
    pub k_p: f64,

    /// Velocity error gain
    pub k_d: f64,
}

/// Parameters for the position controller
#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
pub struct PositionParams {
    /// Gains of the linear (distance) controller
    pub lin: PidGains,

    /// Gains of the angular (heading) controller
    pub ang: PidGains,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load one of the parameter structs from the given file in the parameters 
/// directory.
pub fn load<P>(param_file_path: &str) -> Result<P, MotionCtrlError>
where
    P: serde::de::DeserializeOwned
{
    util::params::load(param_file_path).map_err(MotionCtrlError::ParamLoadError)
}
