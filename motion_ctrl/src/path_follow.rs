//! # Path following controller
//!
//! Keeps the robot on a [`CubicPath`] by steering. The linear velocity is 
//! supplied by the caller and passed straight through; only the angular
//! velocity is controlled.
//!
//! On every step the point on the path closest to the robot is found by a 
//! brute force scan over λ. The heading error to the path tangent at that 
//! point and the distance to it are then combined into a steering demand, 
//! to which a feedforward term for the path curvature is added.
//!
//! The path is finished once the closest point lies at λ ≥ 0.99.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace, warn};
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use crate::{
    params::PathFollowParams,
    Command, Configuration, CtrlMode, CubicPath
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of intervals λ ∈ [0, 1] is divided into when searching for the 
/// closest point.
pub const CLOSEST_POINT_STEPS: usize = 500;

/// Closest point λ at or beyond which the path is considered finished.
pub const PATH_END_LAMBDA: f64 = 0.99;

/// Offset in the denominator of the lateral steering term.
const ANG_ERROR_OFFSET_RAD: f64 = 0.01;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The path following controller
#[derive(Debug, Clone)]
pub struct PathFollowController {
    /// Heading error gain
    k_ang: f64,

    /// Lateral error gain
    k_lin: f64,

    /// The path being followed
    path: Option<CubicPath>,

    /// λ of the closest point found on the last step
    prev_lambda: f64,

    mode: CtrlMode,
}

/// The point on a path closest to some position.
#[derive(Debug, Copy, Clone, Serialize)]
pub struct ClosestPoint {
    /// Path parameter of the point
    pub lambda: f64,

    /// Position and tangent heading of the path at the point
    pub point: Configuration,

    /// Path curvature at the point
    pub curvature_m: f64,

    /// Distance from the query position to the point
    pub dist_m: f64,
}

/// Status report of a single path following step.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct PathFollowReport {
    /// X of the closest point on the path
    pub ref_x_m: f64,

    /// Y of the closest point on the path
    pub ref_y_m: f64,

    /// Path tangent heading at the closest point
    pub ref_heading_rad: f64,

    /// Path parameter of the closest point
    pub lambda: f64,

    /// Path curvature at the closest point
    pub curvature_m: f64,

    /// Distance to the closest point (always positive)
    pub lin_error_m: f64,

    /// Robot heading minus the path heading
    pub ang_error_rad: f64,

    /// True once the end of the path has been reached
    pub finished: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathFollowController {
    /// Create a new controller following the given path.
    pub fn new(k_ang: f64, k_lin: f64, path: CubicPath) -> Self {
        Self {
            k_ang,
            k_lin,
            path: Some(path),
            prev_lambda: 0f64,
            mode: CtrlMode::Tracking,
        }
    }

    /// Create a new controller with no path. Steps will produce stop commands
    /// until a path is set with `update`.
    pub fn idle(k_ang: f64, k_lin: f64) -> Self {
        Self {
            k_ang,
            k_lin,
            path: None,
            prev_lambda: 0f64,
            mode: CtrlMode::Idle,
        }
    }

    /// Create a new idle controller from parameters.
    pub fn from_params(params: &PathFollowParams) -> Self {
        Self::idle(params.k_ang, params.k_lin)
    }

    /// Replace the gains and path, restarting the path from λ = 0.
    pub fn update(&mut self, k_ang: f64, k_lin: f64, path: CubicPath) {
        self.k_ang = k_ang;
        self.k_lin = k_lin;
        self.path = Some(path);
        self.prev_lambda = 0f64;
        self.mode = CtrlMode::Tracking;

        debug!("PathFollow: new path {:?}", path.coeffs());
    }

    pub fn mode(&self) -> CtrlMode {
        self.mode
    }

    pub fn path(&self) -> Option<&CubicPath> {
        self.path.as_ref()
    }

    /// λ of the closest point found on the last step.
    pub fn prev_lambda(&self) -> f64 {
        self.prev_lambda
    }

    /// Calculate the command for the current configuration.
    ///
    /// `v_ms` is the desired linear velocity, which is passed through to the
    /// command unless the path is finished, in which case a stop is commanded.
    pub fn step(&mut self, config: &Configuration, v_ms: f64) -> (Command, PathFollowReport) {
        let path = match self.path {
            Some(ref p) => p,
            None => {
                warn!("PathFollow stepped with no path, commanding stop");
                return (Command::stop(), PathFollowReport {
                    finished: true,
                    ..Default::default()
                })
            }
        };

        let closest = closest_point(path, &config.position_m);
        self.prev_lambda = closest.lambda;

        let finished = self.prev_lambda >= PATH_END_LAMBDA;

        let lin_error_m = closest.dist_m;
        let ang_error_rad = config.heading_rad - closest.point.heading_rad;
        let k = closest.curvature_m;

        // Steering law
        let u = -(self.k_ang * ang_error_rad 
            + self.k_lin * lin_error_m * v_ms * ang_error_rad.sin() 
                / (ang_error_rad + ANG_ERROR_OFFSET_RAD));
        let w_rads = u + k * v_ms * ang_error_rad.cos() / (1.0 - k * lin_error_m);

        let cmd = if finished {
            Command::stop()
        }
        else {
            Command::new(v_ms, w_rads)
        };

        // Mode follows the result of this step, so moving back along the path
        // resumes tracking.
        let mode = if finished { CtrlMode::Finished } else { CtrlMode::Tracking };
        if mode != self.mode {
            match mode {
                CtrlMode::Finished => info!("PathFollow: end of path reached"),
                _ => debug!("PathFollow: {:?} -> {:?}", self.mode, mode)
            }
            self.mode = mode;
        }

        let report = PathFollowReport {
            ref_x_m: closest.point.x(),
            ref_y_m: closest.point.y(),
            ref_heading_rad: closest.point.heading_rad,
            lambda: closest.lambda,
            curvature_m: k,
            lin_error_m,
            ang_error_rad,
            finished
        };

        trace!(
            "PathFollow: l = {:.3}, lin_err = {:.4}, ang_err = {:.4}, v = {:.3}, w = {:.3}",
            report.lambda, lin_error_m, ang_error_rad, cmd.v_ms, cmd.w_rads
        );

        (cmd, report)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Find the point on the path closest to `position_m`.
///
/// λ is scanned from 0 to 1 in `CLOSEST_POINT_STEPS` equal steps. When 
/// several samples are equally close the one with the largest λ is returned.
pub fn closest_point(path: &CubicPath, position_m: &Vector2<f64>) -> ClosestPoint {
    let mut best_lambda = 0f64;
    let mut min_dist_m = f64::INFINITY;

    for i in 0..=CLOSEST_POINT_STEPS {
        let lambda = i as f64 / CLOSEST_POINT_STEPS as f64;
        let dist_m = (path.position(lambda) - position_m).norm();

        if dist_m <= min_dist_m {
            best_lambda = lambda;
            min_dist_m = dist_m;
        }
    }

    ClosestPoint {
        lambda: best_lambda,
        point: path.evaluate(best_lambda),
        curvature_m: path.curvature(best_lambda),
        dist_m: min_dist_m,
    }
}
