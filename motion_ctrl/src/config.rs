//! Robot configuration and command types

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// The configuration (pose and optionally velocity) of the robot in the world frame.
///
/// The heading is measured counter-clockwise from the world X axis and is not wrapped, callers
/// are free to pass it in any range.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Position in the world frame
    pub position_m: Vector2<f64>,

    /// Heading of the robot
    pub heading_rad: f64,

    /// Measured linear velocity in the world frame, if known.
    pub velocity_ms: Option<Vector2<f64>>,
}

/// A velocity command for the actuation layer.
///
/// Positive linear velocity is forwards, positive angular velocity is counter-clockwise (right
/// hand rule about the world Z axis).
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Linear velocity demand
    pub v_ms: f64,

    /// Angular velocity demand
    pub w_rads: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Configuration {
    /// A configuration without velocity information.
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            position_m: Vector2::new(x_m, y_m),
            heading_rad,
            velocity_ms: None,
        }
    }

    /// Add the measured world-frame velocity to this configuration.
    pub fn with_velocity(mut self, dx_ms: f64, dy_ms: f64) -> Self {
        self.velocity_ms = Some(Vector2::new(dx_ms, dy_ms));
        self
    }

    pub fn x(&self) -> f64 {
        self.position_m[0]
    }

    pub fn y(&self) -> f64 {
        self.position_m[1]
    }

    /// Magnitude of the measured velocity, or `None` if the velocity is unknown.
    pub fn speed_ms(&self) -> Option<f64> {
        self.velocity_ms.map(|v| v.norm())
    }
}

impl Command {
    pub fn new(v_ms: f64, w_rads: f64) -> Self {
        Self { v_ms, w_rads }
    }

    /// A command to stop the robot.
    pub fn stop() -> Self {
        Self::default()
    }

    /// True if this command has both velocities exactly zero.
    pub fn is_stop(&self) -> bool {
        self.v_ms == 0.0 && self.w_rads == 0.0
    }
}
