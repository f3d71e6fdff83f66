//! # Position controller
//!
//! Drives the robot to a goal point with two PID controllers, one on the 
//! distance to the goal along the robot's heading and one on the bearing of 
//! the goal relative to the heading.
//!
//! The linear error is the distance to the goal projected onto the robot's 
//! heading, so it shrinks as the heading error grows and becomes negative 
//! when the goal is behind the robot. Once its magnitude is within 
//! `GOAL_TOLERANCE_M` the goal has been reached, both PIDs are reset and a 
//! stop is commanded.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace, warn};
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use crate::{
    clock::Clock,
    params::PositionParams,
    Command, Configuration, CtrlMode, PidController
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Linear error within which the goal has been reached. The boundary itself
/// counts as reached.
pub const GOAL_TOLERANCE_M: f64 = 0.09;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The position controller
#[derive(Debug, Clone)]
pub struct PositionController {
    /// Linear error controller
    lin_ctrl: PidController,

    /// Angular error controller
    ang_ctrl: PidController,

    /// Goal used by `step`
    goal_m: Option<Vector2<f64>>,

    mode: CtrlMode,
}

/// Status report of a position control step.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct PositionReport {
    /// Distance to the goal along the robot's heading
    pub lin_error_m: f64,

    /// Bearing of the goal minus the robot's heading
    pub ang_error_rad: f64,

    /// True if the robot is at the goal
    pub arrived: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PositionController {
    /// Create a new controller from the gains of the linear and angular PIDs.
    pub fn new(
        lin_k_p: f64, lin_k_i: f64, lin_k_d: f64,
        ang_k_p: f64, ang_k_i: f64, ang_k_d: f64
    ) -> Self {
        Self {
            lin_ctrl: PidController::new(lin_k_p, lin_k_i, lin_k_d),
            ang_ctrl: PidController::new(ang_k_p, ang_k_i, ang_k_d),
            goal_m: None,
            mode: CtrlMode::Idle,
        }
    }

    /// Create a new controller from parameters.
    pub fn from_params(params: &PositionParams) -> Self {
        Self {
            lin_ctrl: PidController::from_gains(&params.lin),
            ang_ctrl: PidController::from_gains(&params.ang),
            goal_m: None,
            mode: CtrlMode::Idle,
        }
    }

    /// Replace the gains of both PIDs, keeping their state.
    pub fn update(
        &mut self,
        lin_k_p: f64, lin_k_i: f64, lin_k_d: f64,
        ang_k_p: f64, ang_k_i: f64, ang_k_d: f64
    ) {
        self.lin_ctrl.update(lin_k_p, lin_k_i, lin_k_d);
        self.ang_ctrl.update(ang_k_p, ang_k_i, ang_k_d);
    }

    /// Reset both PIDs.
    pub fn reset(&mut self) {
        self.lin_ctrl.reset();
        self.ang_ctrl.reset();
    }

    /// Set the goal used by `step`.
    pub fn set_goal(&mut self, goal_m: Vector2<f64>) {
        self.goal_m = Some(goal_m);
        self.mode = CtrlMode::Tracking;

        debug!("Position: new goal ({:.3}, {:.3})", goal_m[0], goal_m[1]);
    }

    /// Remove the goal and reset the PIDs.
    pub fn clear_goal(&mut self) {
        self.goal_m = None;
        self.mode = CtrlMode::Idle;
        self.reset();
    }

    pub fn goal(&self) -> Option<Vector2<f64>> {
        self.goal_m
    }

    pub fn mode(&self) -> CtrlMode {
        self.mode
    }

    /// Drive towards the goal set with `set_goal`.
    ///
    /// With no goal set a stop is commanded and the report says arrived.
    pub fn step<C: Clock + ?Sized>(
        &mut self, 
        config: &Configuration, 
        clock: &C
    ) -> (Command, PositionReport) {
        match self.goal_m {
            Some(goal_m) => self.step_to(&goal_m, config, clock),
            None => {
                warn!("Position stepped with no goal, commanding stop");
                (Command::stop(), PositionReport {
                    arrived: true,
                    ..Default::default()
                })
            }
        }
    }

    /// Drive towards `target_m`.
    pub fn step_to<C: Clock + ?Sized>(
        &mut self, 
        target_m: &Vector2<f64>, 
        config: &Configuration, 
        clock: &C
    ) -> (Command, PositionReport) {
        let delta_m = target_m - config.position_m;

        let ang_error_rad = delta_m[1].atan2(delta_m[0]) - config.heading_rad;
        let lin_error_m = delta_m.norm() * ang_error_rad.cos();

        let mut report = PositionReport {
            lin_error_m,
            ang_error_rad,
            arrived: false
        };

        let cmd = if lin_error_m.abs() <= GOAL_TOLERANCE_M {
            if self.mode != CtrlMode::Finished {
                info!(
                    "Position: arrived at ({:.3}, {:.3}), lin_err = {:.4}", 
                    target_m[0], target_m[1], lin_error_m
                );
            }
            self.reset();
            self.mode = CtrlMode::Finished;
            report.arrived = true;

            Command::stop()
        }
        else {
            self.mode = CtrlMode::Tracking;

            Command::new(
                self.lin_ctrl.step(lin_error_m, clock),
                self.ang_ctrl.step(ang_error_rad, clock)
            )
        };

        trace!(
            "Position: lin_err = {:.4}, ang_err = {:.4}, v = {:.3}, w = {:.3}",
            lin_error_m, ang_error_rad, cmd.v_ms, cmd.w_rads
        );

        (cmd, report)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clock::SimClock;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_goal_ahead() {
        let clock = SimClock::new();
        let mut ctrl = PositionController::new(0.5, 0.0, 0.0, 2.0, 0.0, 0.0);
        ctrl.set_goal(Vector2::new(1.0, 0.0));

        let (cmd, report) = ctrl.step(&Configuration::new(0.0, 0.0, 0.0), &clock);

        assert_abs_diff_eq!(report.ang_error_rad, 0.0);
        assert_abs_diff_eq!(report.lin_error_m, 1.0);
        assert!(!report.arrived);
        assert_abs_diff_eq!(cmd.v_ms, 0.5);
        assert_abs_diff_eq!(cmd.w_rads, 0.0);
        assert_eq!(ctrl.mode(), CtrlMode::Tracking);
    }

    #[test]
    fn test_projected_error() {
        let clock = SimClock::new();
        let mut ctrl = PositionController::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

        // Goal to the left
        let (cmd, report) = ctrl.step_to(
            &Vector2::new(1.0, 1.0), &Configuration::new(0.0, 0.0, 0.0), &clock
        );
        assert_abs_diff_eq!(report.ang_error_rad, FRAC_PI_2 / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(report.lin_error_m, 1.0, epsilon = 1e-12);
        assert!(cmd.w_rads > 0.0);

        // Goal behind gives a negative linear error
        let (cmd, report) = ctrl.step_to(
            &Vector2::new(-1.0, 0.1), &Configuration::new(0.0, 0.0, 0.0), &clock
        );
        assert!(report.lin_error_m < 0.0);
        assert!(cmd.v_ms < 0.0);
    }

    #[test]
    fn test_arrival_boundary() {
        let clock = SimClock::new();
        let mut ctrl = PositionController::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

        // Exactly on the tolerance counts as arrived
        let (cmd, report) = ctrl.step_to(
            &Vector2::new(GOAL_TOLERANCE_M, 0.0), &Configuration::new(0.0, 0.0, 0.0), &clock
        );
        assert_eq!(report.lin_error_m, GOAL_TOLERANCE_M);
        assert!(report.arrived);
        assert!(cmd.is_stop());
        assert_eq!(ctrl.mode(), CtrlMode::Finished);

        let (_, report) = ctrl.step_to(
            &Vector2::new(0.1, 0.0), &Configuration::new(0.0, 0.0, 0.0), &clock
        );
        assert!(!report.arrived);

        // Goal off to the side within the projected tolerance also counts
        let (_, report) = ctrl.step_to(
            &Vector2::new(0.0, 1.0), &Configuration::new(0.0, 0.0, 0.0), &clock
        );
        assert!(report.arrived);
    }

    #[test]
    fn test_arrival_resets_pids() {
        let mut clock = SimClock::new();
        let mut ctrl = PositionController::new(1.0, 1.0, 0.0, 1.0, 0.0, 0.0);
        ctrl.set_goal(Vector2::new(1.0, 0.0));

        let far = Configuration::new(0.0, 0.0, 0.0);
        ctrl.step(&far, &clock);
        clock.advance_s(1.0);
        // P = 1, I = 1 * 1
        let (cmd, _) = ctrl.step(&far, &clock);
        assert_abs_diff_eq!(cmd.v_ms, 2.0, epsilon = 1e-9);

        clock.advance_s(1.0);
        let (_, report) = ctrl.step(&Configuration::new(0.95, 0.0, 0.0), &clock);
        assert!(report.arrived);

        // Integral was cleared on arrival, so this is a first call again
        clock.advance_s(1.0);
        let (cmd, _) = ctrl.step(&far, &clock);
        assert_abs_diff_eq!(cmd.v_ms, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_update_keeps_state() {
        let mut clock = SimClock::new();
        let mut ctrl = PositionController::new(1.0, 1.0, 0.0, 1.0, 0.0, 0.0);
        ctrl.set_goal(Vector2::new(1.0, 0.0));

        let far = Configuration::new(0.0, 0.0, 0.0);
        ctrl.step(&far, &clock);
        clock.advance_s(1.0);
        ctrl.step(&far, &clock);

        ctrl.update(0.0, 1.0, 0.0, 1.0, 0.0, 0.0);
        clock.advance_s(1.0);
        // Integral of 2 kept through the update
        let (cmd, _) = ctrl.step(&far, &clock);
        assert_abs_diff_eq!(cmd.v_ms, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_no_goal() {
        let clock = SimClock::new();
        let mut ctrl = PositionController::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);
        assert_eq!(ctrl.mode(), CtrlMode::Idle);

        let (cmd, report) = ctrl.step(&Configuration::new(0.0, 0.0, 0.0), &clock);
        assert!(cmd.is_stop());
        assert!(report.arrived);

        ctrl.set_goal(Vector2::new(1.0, 0.0));
        ctrl.clear_goal();
        assert_eq!(ctrl.goal(), None);
        assert_eq!(ctrl.mode(), CtrlMode::Idle);
    }
}
