//! # Motion control library.
//!
//! Feedback controllers for a differential drive robot. Each controller takes
//! the robot's current [`Configuration`] once per control cycle and produces a
//! [`Command`] of linear and angular velocity for the actuation layer.
//!
//! Three controllers are provided:
//!
//!  - [`PathFollowController`] - steers onto a cubic path using the closest
//!    point on the path and its curvature.
//!  - [`TrajController`] - tracks a time parametrised trajectory along a cubic
//!    path by feedback linearisation of the unicycle model.
//!  - [`PositionController`] - drives to a point using a pair of PID
//!    controllers.
//!
//! Controllers are driven synchronously by the caller and take `&mut self`, so
//! only one call can be in flight per instance. Time is read from an injected
//! [`Clock`] so that tests can run in simulated time.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Time sources for the time-aware controllers
pub mod clock;

/// Robot configuration and velocity command types
pub mod config;

/// Cubic path evaluation
pub mod cubic;

/// Kinematic unicycle model, used in place of a real robot or simulation
pub mod model;

/// Controller parameters
pub mod params;

/// Closest point path following controller
pub mod path_follow;

/// Time-aware PID controller
pub mod pid;

/// Point to point position controller
pub mod position;

/// Trajectory tracking controller
pub mod traj;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;

pub use clock::{Clock, MonotonicClock, SimClock};
pub use config::{Command, Configuration};
pub use cubic::{CubicPath, PathError};
pub use path_follow::{PathFollowController, PathFollowReport};
pub use pid::PidController;
pub use position::{PositionController, PositionReport};
pub use traj::{TrajController, TrajReport};

// ------------------------------------------------------------------------------------------------
// ENUMERATIONS
// ------------------------------------------------------------------------------------------------

/// Execution mode shared by all controllers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum CtrlMode {
    /// Nothing to track. Stepping the controller produces a stop command.
    Idle,

    /// A path, trajectory or goal is being tracked.
    Tracking,

    /// The end of the path or trajectory, or the goal, has been reached.
    Finished,
}

/// Errors which can occur in the motion controllers.
#[derive(Debug, thiserror::Error)]
pub enum MotionCtrlError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// The maximum speed of a trajectory must be strictly positive and finite.
    #[error("Invalid maximum trajectory speed {0} m/s")]
    InvalidMaxSpeed(f64),

    /// Trajectory tracking needs the measured world-frame velocity of the robot.
    #[error("The configuration does not contain the robot's velocity")]
    NoVelocity,
}

impl Default for CtrlMode {
    fn default() -> Self {
        CtrlMode::Idle
    }
}
