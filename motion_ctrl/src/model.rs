//! Kinematic unicycle model
//!
//! Integrates velocity commands into a configuration. Used in the closed loop
//! tests and by `motion_exec` in place of a real robot.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;

use crate::{Command, Configuration};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// A unicycle which exactly follows the velocity commands given to it.
#[derive(Debug, Copy, Clone, Default)]
pub struct Unicycle {
    config: Configuration,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Unicycle {
    /// Create a stationary unicycle at the given pose.
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            config: Configuration::new(x_m, y_m, heading_rad).with_velocity(0.0, 0.0),
        }
    }

    /// Apply `cmd` for `dt_s` seconds.
    ///
    /// The position is advanced along the mid-step heading, the velocity is set to the commanded
    /// linear speed along the new heading. Non-positive steps do nothing.
    pub fn integrate(&mut self, cmd: Command, dt_s: f64) {
        if dt_s.is_nan() || dt_s <= 0.0 {
            return;
        }

        let mid_heading_rad = self.config.heading_rad + 0.5 * cmd.w_rads * dt_s;

        self.config.position_m += 
            Vector2::new(mid_heading_rad.cos(), mid_heading_rad.sin()) * cmd.v_ms * dt_s;
        self.config.heading_rad += cmd.w_rads * dt_s;

        let heading_rad = self.config.heading_rad;
        self.config.velocity_ms = Some(
            Vector2::new(heading_rad.cos(), heading_rad.sin()) * cmd.v_ms
        );
    }

    /// The current configuration, including velocity.
    pub fn configuration(&self) -> Configuration {
        self.config
    }
}
