//! # Trajectory controller
//!
//! Tracks a time parametrised trajectory along a [`CubicPath`].
//!
//! The speed along the path follows a cosine profile which starts and ends at
//! rest and peaks at the maximum speed half way through:
//!
//! ```text
//! v(t) = v_max (1 - cos(2π t / t_max)) / 2,    t_max = 2 L / v_max
//! ```
//!
//! where `L` is the arc length of the path. The profile is integrated to give
//! the path parameter λ(t), and so the reference position, velocity and 
//! acceleration. A PD law on the position and velocity errors corrects the
//! reference acceleration, which is then mapped onto the unicycle's inputs 
//! by inverting its dynamics (feedback linearisation):
//!
//! ```text
//! dv = ax cos θ + ay sin θ
//! w  = (ay cos θ - ax sin θ) / |v|
//! ```
//!
//! The linear velocity command is the integral of `dv`.
//!
//! All integration is forward Euler using the time between consecutive steps
//! as read from the [`Clock`], so the step rate doesn't have to be constant.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::f64::consts::PI;
use std::time::Instant;
use log::{debug, info, trace};
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use crate::{
    clock::Clock,
    params::TrajParams,
    Command, Configuration, CtrlMode, CubicPath, MotionCtrlError
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Linear velocity command on the first step of a trajectory.
const INITIAL_VEL_CMD_MS: f64 = 0.01;

/// Offset added to the measured speed when inverting the unicycle model, 
/// keeps the angular command finite at rest.
const SPEED_OFFSET_MS: f64 = 0.01;

/// The trajectory is finished once the measured distance travelled is within
/// this distance of the path length.
const DIST_END_TOLERANCE_M: f64 = 0.01;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The trajectory controller
#[derive(Debug, Clone)]
pub struct TrajController {
    /// Velocity error gain
    k_d: f64,

    /// Position error gain
    k_p: f64,

    /// Path of the installed trajectory, `None` if there isn't one.
    path: Option<CubicPath>,

    /// Peak speed of the velocity profile
    v_max_ms: f64,

    /// Tracking state, created on the first step after a trajectory is set.
    state: Option<TrajState>,

    mode: CtrlMode,

    report: TrajReport,
}

/// Integration state of the trajectory being tracked.
#[derive(Debug, Clone)]
struct TrajState {
    prev_time: Instant,

    /// Time since the start of the trajectory
    t_s: f64,

    /// Duration of the trajectory
    t_max_s: f64,

    /// Path parameter of the reference
    lambda: f64,

    /// Arc length of the whole path
    length_m: f64,

    /// Path derivative at the current `lambda`
    deriv: Vector2<f64>,

    /// Linear velocity command
    v_cmd_ms: f64,

    /// Integral of the profile speed
    profile_dist_m: f64,

    /// Integral of the measured robot speed
    robot_dist_m: f64,
}

/// Status report of a trajectory control step.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct TrajReport {
    /// Reference position X
    pub ref_x_m: f64,

    /// Reference position Y
    pub ref_y_m: f64,

    /// Reference heading (path tangent)
    pub ref_heading_rad: f64,

    /// Path curvature at the reference
    pub ref_curvature_m: f64,

    /// Profile speed
    pub v_l_ms: f64,

    /// Profile acceleration
    pub dv_l_mss: f64,

    /// Angular velocity from the model inversion, before the end of 
    /// trajectory check.
    pub w_cmd_rads: f64,

    /// Path parameter of the reference
    pub lambda: f64,

    /// Time since the start of the trajectory
    pub t_s: f64,

    /// Duration of the trajectory
    pub t_max_s: f64,

    /// Arc length of the path
    pub length_m: f64,

    /// Distance travelled by the robot, from its measured speed
    pub robot_dist_m: f64,

    /// True once the trajectory has finished
    pub finished: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrajController {
    /// Create a new controller with no trajectory.
    pub fn new(k_d: f64, k_p: f64) -> Self {
        Self {
            k_d,
            k_p,
            path: None,
            v_max_ms: 0f64,
            state: None,
            mode: CtrlMode::Idle,
            report: TrajReport::default(),
        }
    }

    /// Create a new controller from parameters.
    pub fn from_params(params: &TrajParams) -> Self {
        Self::new(params.k_d, params.k_p)
    }

    /// Drop the current trajectory. Until a new one is set the controller
    /// will command the robot to stop.
    pub fn reset(&mut self) {
        self.path = None;
        self.v_max_ms = 0f64;
        self.state = None;
        self.mode = CtrlMode::Idle;
        self.report = TrajReport::default();
    }

    /// Install a new trajectory along `path` with peak speed `v_max_ms`.
    ///
    /// Tracking starts from the first call to `step` after this.
    pub fn set_trajectory(
        &mut self, 
        path: CubicPath, 
        v_max_ms: f64
    ) -> Result<(), MotionCtrlError> {
        if !(v_max_ms > 0f64 && v_max_ms.is_finite()) {
            return Err(MotionCtrlError::InvalidMaxSpeed(v_max_ms))
        }

        self.reset();
        self.path = Some(path);
        self.v_max_ms = v_max_ms;
        self.mode = CtrlMode::Tracking;

        debug!(
            "Traj: new trajectory {:?} at {:.3} m/s", 
            path.coeffs(), 
            v_max_ms
        );

        Ok(())
    }

    pub fn mode(&self) -> CtrlMode {
        self.mode
    }

    /// The report from the last step.
    pub fn report(&self) -> &TrajReport {
        &self.report
    }

    /// Calculate the command for the current configuration.
    ///
    /// The configuration must include the measured velocity. If there's no 
    /// trajectory, or it has finished, a stop command is returned with the 
    /// report marked as finished.
    pub fn step<C: Clock + ?Sized>(
        &mut self, 
        config: &Configuration, 
        clock: &C
    ) -> Result<(Command, TrajReport), MotionCtrlError> {

        // ---- MODE CHECKS ----

        let path = match (self.mode, self.path) {
            (CtrlMode::Tracking, Some(p)) => p,
            _ => {
                trace!("Traj: no trajectory to track ({:?})", self.mode);
                self.report.finished = true;
                return Ok((Command::stop(), self.report))
            }
        };

        let vel_ms = config.velocity_ms.ok_or(MotionCtrlError::NoVelocity)?;

        // ---- TIME ----

        let now = clock.now();
        let v_max_ms = self.v_max_ms;
        let s = self.state.get_or_insert_with(
            || TrajState::new(&path, v_max_ms, now)
        );

        let dt = now.saturating_duration_since(s.prev_time).as_secs_f64();
        s.t_s += dt;
        s.prev_time = now;

        // ---- REFERENCE ----

        let v_l_ms = speed_profile_cos(s.t_s, s.t_max_s, v_max_ms);
        let dv_l_mss = speed_profile_cos_derivative(s.t_s, s.t_max_s, v_max_ms);
        s.profile_dist_m += v_l_ms * dt;

        // Advance along the path at the profile speed
        s.lambda += v_l_ms * dt / s.deriv.norm();
        s.deriv = path.derivative(s.lambda);

        let ref_pos_m = path.position(s.lambda);
        let ref_heading_rad = s.deriv[1].atan2(s.deriv[0]);
        let ref_dir = Vector2::new(ref_heading_rad.cos(), ref_heading_rad.sin());

        let ref_vel_ms = v_l_ms * ref_dir;
        let ref_acc_mss = dv_l_mss * ref_dir;

        // ---- CONTROL ----

        let speed_ms = vel_ms.norm();
        s.robot_dist_m += speed_ms * dt;

        // PD corrected acceleration demand
        let acc_cmd_mss = ref_acc_mss
            + self.k_d * (ref_vel_ms - vel_ms)
            + self.k_p * (ref_pos_m - config.position_m);

        // Inverse of the unicycle dynamics
        let (sin_th, cos_th) = config.heading_rad.sin_cos();
        let dv_mss = acc_cmd_mss[0] * cos_th + acc_cmd_mss[1] * sin_th;
        let w_cmd_rads = (acc_cmd_mss[1] * cos_th - acc_cmd_mss[0] * sin_th) 
            / (speed_ms + SPEED_OFFSET_MS);

        s.v_cmd_ms += dv_mss * dt;

        // ---- END OF TRAJECTORY ----

        let finished = s.t_s >= s.t_max_s
            || s.lambda >= 1f64
            || s.robot_dist_m >= s.length_m - DIST_END_TOLERANCE_M;

        let cmd = if finished {
            info!(
                "Traj finished: dt = {:.4} | t = {:.4} | t_max = {:.4} | l = {:.4} \
                | int(v_l) = {:.4} | int(v_robot) = {:.4} | L = {:.4}",
                dt, s.t_s, s.t_max_s, s.lambda, s.profile_dist_m, s.robot_dist_m, s.length_m
            );
            Command::stop()
        }
        else {
            Command::new(s.v_cmd_ms, w_cmd_rads)
        };

        self.report = TrajReport {
            ref_x_m: ref_pos_m[0],
            ref_y_m: ref_pos_m[1],
            ref_heading_rad,
            ref_curvature_m: path.curvature(s.lambda),
            v_l_ms,
            dv_l_mss,
            w_cmd_rads,
            lambda: s.lambda,
            t_s: s.t_s,
            t_max_s: s.t_max_s,
            length_m: s.length_m,
            robot_dist_m: s.robot_dist_m,
            finished
        };

        if finished {
            self.mode = CtrlMode::Finished;
        }

        trace!(
            "Traj: t = {:.3}, l = {:.4}, ref = ({:.3}, {:.3}), v_l = {:.3}, v = {:.3}, w = {:.3}",
            self.report.t_s, self.report.lambda, 
            self.report.ref_x_m, self.report.ref_y_m,
            v_l_ms, cmd.v_ms, cmd.w_rads
        );

        Ok((cmd, self.report))
    }
}

impl TrajState {
    /// Initial tracking state, at the start of the path and at rest.
    fn new(path: &CubicPath, v_max_ms: f64, now: Instant) -> Self {
        let length_m = path.arc_length(1f64);
        let t_max_s = 2f64 * length_m / v_max_ms;

        info!(
            "Traj started: L = {:.4} m, v_max = {:.3} m/s, t_max = {:.3} s", 
            length_m, v_max_ms, t_max_s
        );

        Self {
            prev_time: now,
            t_s: 0f64,
            t_max_s,
            lambda: 0f64,
            length_m,
            deriv: path.derivative(0f64),
            v_cmd_ms: INITIAL_VEL_CMD_MS,
            profile_dist_m: 0f64,
            robot_dist_m: 0f64,
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Cosine velocity profile, `v(t) = v_max (1 - cos(2π t / t_max)) / 2`.
pub fn speed_profile_cos(t_s: f64, t_max_s: f64, v_max_ms: f64) -> f64 {
    (1f64 - (2f64 * PI * t_s / t_max_s).cos()) * v_max_ms / 2f64
}

/// Time derivative of the cosine velocity profile, 
/// `v'(t) = π v_max / t_max sin(2π t / t_max)`.
pub fn speed_profile_cos_derivative(t_s: f64, t_max_s: f64, v_max_ms: f64) -> f64 {
    (2f64 * PI * t_s / t_max_s).sin() * PI * v_max_ms / t_max_s
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clock::SimClock;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use crate::cubic::PathError;
    use util::maths::simpson;

    fn x_axis() -> CubicPath {
        CubicPath::new([0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap()
    }

    #[test]
    fn test_profile_boundaries() {
        let (t_max, v_max) = (4.0, 0.5);

        assert_abs_diff_eq!(speed_profile_cos(0.0, t_max, v_max), 0.0);
        assert_abs_diff_eq!(speed_profile_cos(t_max, t_max, v_max), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(speed_profile_cos(t_max / 2.0, t_max, v_max), v_max, epsilon = 1e-12);

        assert_abs_diff_eq!(speed_profile_cos_derivative(0.0, t_max, v_max), 0.0);
        assert_abs_diff_eq!(
            speed_profile_cos_derivative(t_max / 4.0, t_max, v_max), 
            PI * v_max / t_max,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_profile_integrates_to_length() {
        let path = CubicPath::new([0.0, 1.0, 0.5, -0.2, 0.0, 0.3, 1.0, 0.0]).unwrap();
        let v_max = 0.4;
        let length = path.arc_length(1.0);
        let t_max = 2.0 * length / v_max;

        let dist = simpson(|t| speed_profile_cos(t, t_max, v_max), 0.0, t_max, 1000);
        assert_relative_eq!(dist, length, max_relative = 1e-9);
    }

    #[test]
    fn test_idle() {
        let clock = SimClock::new();
        let mut ctrl = TrajController::new(1.0, 1.0);
        assert_eq!(ctrl.mode(), CtrlMode::Idle);

        for config in [
            Configuration::new(0.0, 0.0, 0.0),
            Configuration::new(5.0, -3.0, 2.0).with_velocity(1.0, 1.0),
        ].iter() {
            let (cmd, report) = ctrl.step(config, &clock).unwrap();
            assert!(cmd.is_stop());
            assert!(report.finished);
        }
    }

    #[test]
    fn test_set_trajectory_validation() {
        let mut ctrl = TrajController::new(1.0, 1.0);

        for v in [0.0, -1.0, f64::NAN, f64::INFINITY].iter() {
            match ctrl.set_trajectory(x_axis(), *v) {
                Err(MotionCtrlError::InvalidMaxSpeed(_)) => (),
                r => panic!("Expected InvalidMaxSpeed for {}, got {:?}", v, r)
            }
        }
        assert_eq!(ctrl.mode(), CtrlMode::Idle);

        ctrl.set_trajectory(x_axis(), 0.5).unwrap();
        assert_eq!(ctrl.mode(), CtrlMode::Tracking);
    }

    #[test]
    fn test_requires_velocity() {
        let clock = SimClock::new();
        let mut ctrl = TrajController::new(1.0, 1.0);
        ctrl.set_trajectory(x_axis(), 0.5).unwrap();

        match ctrl.step(&Configuration::new(0.0, 0.0, 0.0), &clock) {
            Err(MotionCtrlError::NoVelocity) => (),
            r => panic!("Expected NoVelocity, got {:?}", r)
        }
    }

    #[test]
    fn test_first_step_initialises() {
        let clock = SimClock::new();
        let mut ctrl = TrajController::new(1.0, 1.0);
        ctrl.set_trajectory(x_axis(), 0.5).unwrap();

        let config = Configuration::new(0.0, 0.0, 0.0).with_velocity(0.0, 0.0);
        let (cmd, report) = ctrl.step(&config, &clock).unwrap();

        assert_relative_eq!(report.length_m, 1.0, max_relative = 1e-9);
        assert_relative_eq!(report.t_max_s, 4.0, max_relative = 1e-9);
        assert_eq!(report.t_s, 0.0);
        assert_eq!(report.lambda, 0.0);
        assert!(!report.finished);

        // No time has passed so the command is the initial seed
        assert_eq!(cmd.v_ms, INITIAL_VEL_CMD_MS);
        assert_eq!(cmd.w_rads, 0.0);
    }

    #[test]
    fn test_straight_trajectory_reaches_path_end() {
        let mut clock = SimClock::new();
        let mut ctrl = TrajController::new(2.0, 1.0);
        ctrl.set_trajectory(x_axis(), 0.5).unwrap();

        // Robot held at rest, so the measured distance guard can't fire
        let config = Configuration::new(0.0, 0.0, 0.0).with_velocity(0.0, 0.0);
        let (_, mut report) = ctrl.step(&config, &clock).unwrap();

        let dt = 0.01;
        let mut steps = 0;
        while !report.finished {
            clock.advance_s(dt);
            let (cmd, r) = ctrl.step(&config, &clock).unwrap();
            assert!(cmd.v_ms.is_finite() && cmd.w_rads.is_finite());
            report = r;

            steps += 1;
            assert!(steps < 1000, "Trajectory didn't finish");
        }

        // The reference reaches the end of the path no later than t_max
        assert!(report.lambda >= 1.0 - 1e-9, "l = {}", report.lambda);
        assert!(report.t_s <= report.t_max_s + dt, "t = {}", report.t_s);
        assert_eq!(report.robot_dist_m, 0.0);
        assert_eq!(ctrl.mode(), CtrlMode::Finished);

        // Further steps keep the robot stopped
        clock.advance_s(dt);
        let (cmd, report) = ctrl.step(&config, &clock).unwrap();
        assert!(cmd.is_stop());
        assert!(report.finished);
    }

    #[test]
    fn test_finishes_on_time() {
        let mut clock = SimClock::new();
        let mut ctrl = TrajController::new(2.0, 1.0);
        ctrl.set_trajectory(x_axis(), 0.5).unwrap();

        let config = Configuration::new(0.0, 0.0, 0.0).with_velocity(0.0, 0.0);
        let (_, report) = ctrl.step(&config, &clock).unwrap();
        let t_max = report.t_max_s;

        // Jumping straight past t_max samples the profile where it's almost
        // stopped, so the reference barely moves from the start
        clock.advance_s(t_max + 0.001);
        let (cmd, report) = ctrl.step(&config, &clock).unwrap();

        assert!(report.finished);
        assert!(cmd.is_stop());
        assert!(report.t_s >= t_max);
        assert!(report.lambda < 1e-3, "l = {}", report.lambda);
        assert_eq!(report.robot_dist_m, 0.0);
        assert_eq!(ctrl.mode(), CtrlMode::Finished);
    }

    #[test]
    fn test_finishes_on_measured_distance() {
        let mut clock = SimClock::new();
        let mut ctrl = TrajController::new(2.0, 1.0);
        ctrl.set_trajectory(x_axis(), 0.5).unwrap();

        let config = Configuration::new(0.0, 0.0, 0.0).with_velocity(0.0, 0.0);
        ctrl.step(&config, &clock).unwrap();

        // A robot reporting 10 m/s covers the whole 1 m path in 0.1 s
        clock.advance_s(0.1);
        let fast = Configuration::new(0.0, 0.0, 0.0).with_velocity(10.0, 0.0);
        let (cmd, report) = ctrl.step(&fast, &clock).unwrap();

        assert!(report.finished);
        assert!(cmd.is_stop());
        assert_abs_diff_eq!(report.robot_dist_m, 1.0, epsilon = 1e-6);
        assert!(report.robot_dist_m >= report.length_m - DIST_END_TOLERANCE_M);
        assert!(report.t_s < 0.5 * report.t_max_s);
        assert!(report.lambda < 0.1, "l = {}", report.lambda);
        assert_eq!(ctrl.mode(), CtrlMode::Finished);
    }

    #[test]
    fn test_stationary_start_path_rejected() {
        // x = 3l^2 - 2l^3 has zero derivative at l = 0, so the reference 
        // could never leave the start
        match CubicPath::new([0.0, 0.0, 3.0, -2.0, 0.0, 0.0, 0.0, 0.0]) {
            Err(e) => assert!(matches!(
                MotionCtrlError::from(e), 
                MotionCtrlError::InvalidPath(PathError::ZeroTangent)
            )),
            Ok(p) => panic!("Expected ZeroTangent, got {:?}", p)
        }
    }

    #[test]
    fn test_reference_follows_path() {
        // Robot placed exactly on the reference every step
        let path = CubicPath::new([0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.5, 0.0]).unwrap();
        let mut clock = SimClock::new();
        let mut ctrl = TrajController::new(2.0, 1.0);
        ctrl.set_trajectory(path, 0.3).unwrap();

        let mut config = Configuration::new(0.0, 0.0, 0.0).with_velocity(0.0, 0.0);
        let mut report = ctrl.step(&config, &clock).unwrap().1;

        let dt = 0.02;
        while !report.finished {
            clock.advance_s(dt);
            report = ctrl.step(&config, &clock).unwrap().1;

            let (s, c) = report.ref_heading_rad.sin_cos();
            config = Configuration::new(report.ref_x_m, report.ref_y_m, report.ref_heading_rad)
                .with_velocity(report.v_l_ms * c, report.v_l_ms * s);

            let on_path = path.position(report.lambda);
            assert_abs_diff_eq!(report.ref_x_m, on_path[0]);
            assert_abs_diff_eq!(report.ref_y_m, on_path[1]);
        }

        // Finished close to the end of the path
        let end = path.position(1.0);
        let dist = ((report.ref_x_m - end[0]).powi(2) + (report.ref_y_m - end[1]).powi(2)).sqrt();
        assert!(dist < 0.05, "Finished {} m from the end", dist);
    }

    #[test]
    fn test_reset() {
        let clock = SimClock::new();
        let mut ctrl = TrajController::new(1.0, 1.0);
        ctrl.set_trajectory(x_axis(), 0.5).unwrap();

        let config = Configuration::new(0.0, 0.0, 0.0).with_velocity(0.0, 0.0);
        ctrl.step(&config, &clock).unwrap();

        ctrl.reset();
        assert_eq!(ctrl.mode(), CtrlMode::Idle);

        let (cmd, report) = ctrl.step(&config, &clock).unwrap();
        assert!(cmd.is_stop());
        assert!(report.finished);
        assert_eq!(report.t_max_s, 0.0);
    }
}
