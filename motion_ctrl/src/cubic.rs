//! # Cubic path
//!
//! A path in the XY plane defined by a pair of cubic polynomials in a 
//! normalised parameter λ ∈ [0, 1]:
//!
//! ```text
//! x(λ) = c0 + c1 λ + c2 λ² + c3 λ³
//! y(λ) = c4 + c5 λ + c6 λ² + c7 λ³
//! ```
//!
//! λ = 0 is the start of the path and λ = 1 the end. All functions here are 
//! pure. Heading and curvature divide by the magnitude of the first 
//! derivative, so they are not defined where that derivative vanishes. 
//! `CubicPath::new` rejects paths of zero length and paths which start with a
//! zero tangent, but a path may still have an isolated cusp further along.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
use crate::Configuration;
use util::maths::{poly_val, simpson};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of coefficients defining a cubic path.
pub const NUM_COEFFS: usize = 8;

/// Number of Simpson's rule sub-intervals used to integrate the arc length.
pub const ARC_LENGTH_STEPS: usize = 1000;

/// Paths shorter than this are considered degenerate.
pub const MIN_PATH_LENGTH_M: f64 = 1e-6;

/// Smallest allowed magnitude of the path derivative at λ = 0.
pub const MIN_START_TANGENT: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A two-axis cubic polynomial path.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubicPath {
    coeffs: [f64; NUM_COEFFS],
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PathError {
    #[error("Path coefficient {0} is not finite")]
    NonFiniteCoeff(usize),

    #[error("The path has zero length")]
    ZeroLength,

    /// The start heading is undefined and trajectories cannot advance from λ = 0.
    #[error("The path tangent vanishes at the start of the path")]
    ZeroTangent,

    #[error("Expected 8 path coefficients, found {0}")]
    WrongNumCoeffs(usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CubicPath {
    /// Create a new path, checking that it is well defined.
    pub fn new(coeffs: [f64; NUM_COEFFS]) -> Result<Self, PathError> {
        if let Some(i) = coeffs.iter().position(|c| !c.is_finite()) {
            return Err(PathError::NonFiniteCoeff(i));
        }

        let path = Self { coeffs };

        if path.arc_length(1.0) <= MIN_PATH_LENGTH_M {
            return Err(PathError::ZeroLength);
        }

        if path.derivative(0.0).norm() <= MIN_START_TANGENT {
            return Err(PathError::ZeroTangent);
        }

        Ok(path)
    }

    /// Create a new path from a slice of coefficients.
    pub fn from_slice(coeffs: &[f64]) -> Result<Self, PathError> {
        if coeffs.len() != NUM_COEFFS {
            return Err(PathError::WrongNumCoeffs(coeffs.len()));
        }

        let mut c = [0f64; NUM_COEFFS];
        c.copy_from_slice(coeffs);

        Self::new(c)
    }

    /// Straight line path between two points.
    pub fn line(start_m: Vector2<f64>, end_m: Vector2<f64>) -> Result<Self, PathError> {
        let d = end_m - start_m;
        Self::new([start_m[0], d[0], 0.0, 0.0, start_m[1], d[1], 0.0, 0.0])
    }

    pub fn coeffs(&self) -> &[f64; NUM_COEFFS] {
        &self.coeffs
    }

    /// Position on the path at `lambda`.
    pub fn position(&self, lambda: f64) -> Vector2<f64> {
        Vector2::new(
            poly_val(lambda, &self.coeffs[0..4]),
            poly_val(lambda, &self.coeffs[4..8]),
        )
    }

    /// First derivative of the path with respect to lambda.
    pub fn derivative(&self, lambda: f64) -> Vector2<f64> {
        let c = &self.coeffs;
        Vector2::new(
            poly_val(lambda, &[c[1], 2.0 * c[2], 3.0 * c[3]]),
            poly_val(lambda, &[c[5], 2.0 * c[6], 3.0 * c[7]]),
        )
    }

    /// Second derivative of the path with respect to lambda.
    pub fn second_derivative(&self, lambda: f64) -> Vector2<f64> {
        let c = &self.coeffs;
        Vector2::new(
            2.0 * c[2] + 6.0 * c[3] * lambda,
            2.0 * c[6] + 6.0 * c[7] * lambda,
        )
    }

    /// Heading of the path tangent at `lambda`.
    pub fn heading(&self, lambda: f64) -> f64 {
        let d = self.derivative(lambda);
        d[1].atan2(d[0])
    }

    /// Evaluate the path at `lambda`, giving the position and tangent heading 
    /// as a configuration.
    pub fn evaluate(&self, lambda: f64) -> Configuration {
        let p = self.position(lambda);
        Configuration::new(p[0], p[1], self.heading(lambda))
    }

    /// Signed curvature of the path at `lambda`.
    ///
    /// Positive curvature turns counter-clockwise. The result is NaN or
    /// infinite where the first derivative is zero.
    pub fn curvature(&self, lambda: f64) -> f64 {
        let d = self.derivative(lambda);
        let dd = self.second_derivative(lambda);

        (d[0] * dd[1] - d[1] * dd[0]) / d.norm_squared().powf(1.5)
    }

    /// Arc length of the path from the start up to `lambda_end`.
    pub fn arc_length(&self, lambda_end: f64) -> f64 {
        simpson(
            |l| self.derivative(l).norm(),
            0.0,
            lambda_end,
            ARC_LENGTH_STEPS
        )
    }
}
