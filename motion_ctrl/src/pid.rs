//! # PID controller
//!
//! A single axis PID controller whose integral and derivative terms are based 
//! on the time elapsed between consecutive calls, read from a [`Clock`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::time::Instant;
use log::trace;
use serde::Serialize;

// Internal
use crate::{clock::Clock, params::PidGains};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    /// Previous instant that the error was passed in 
    #[serde(skip)]
    prev_time: Option<Instant>,

    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Dervative gain
    k_d: f64,

    /// Previous error
    prev_error: Option<f64>,

    /// The integral accumulation
    integral: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {

    /// Create a new controller with the given gains.
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self {
            k_p, k_i, k_d,
            integral: 0f64,
            prev_time: None,
            prev_error: None
        }
    }

    /// Create a new controller from a set of gains.
    pub fn from_gains(gains: &PidGains) -> Self {
        Self::new(gains.k_p, gains.k_i, gains.k_d)
    }

    /// Get the value of the controller for the given error.
    ///
    /// This function is time-aware so there is no need to pass in a delta-time
    /// value.
    pub fn step<C: Clock + ?Sized>(&mut self, error: f64, clock: &C) -> f64 {
        // Get current time
        let curr_time = clock.now();

        // Calculate dt. A zero dt (two calls in the same instant) is treated
        // like the first call, since it can't be used to differentiate.
        let dt = match self.prev_time {
            Some(t0) => Some(
                curr_time.saturating_duration_since(t0).as_secs_f64()
            ).filter(|t| *t > 0f64),
            None => None
        };

        // Accumulate the integral term.
        //
        // If there's no time difference then we don't accumulate the integral
        // The other option is to add on the error and that will produce a 
        // large spike in integral compared to normal operation, so we don't do
        // this.
        self.integral += match dt {
            Some(t) => error * t,
            None => 0f64
        };

        // Calculate the derivative.
        //
        // If there's no time difference again we assume no derivative, for the
        // same reasons as for integral.
        let deriv = match (self.prev_error, dt) {
            (Some(e), Some(t)) => (error - e) / t,
            _ => 0f64
        };

        // Calculate the output
        let out = 
            self.k_p * error 
            + self.k_i * self.integral 
            + self.k_d * deriv;

        trace!(
            "PID: err = {:.4}, int = {:.4}, deriv = {:.4}, out = {:.4}",
            error, self.integral, deriv, out
        );
        
        // Remember the previous error and time
        self.prev_error = Some(error);
        self.prev_time = Some(curr_time);

        // Return
        out
    }

    /// Clear the integral and derivative history, keeping the gains.
    pub fn reset(&mut self) {
        self.integral = 0f64;
        self.prev_error = None;
        self.prev_time = None;
    }

    /// Replace the gains.
    ///
    /// The accumulated state is kept, call `reset` as well for a clean start.
    pub fn update(&mut self, k_p: f64, k_i: f64, k_d: f64) {
        self.k_p = k_p;
        self.k_i = k_i;
        self.k_d = k_d;
    }

    /// The current `(k_p, k_i, k_d)` gains.
    pub fn gains(&self) -> (f64, f64, f64) {
        (self.k_p, self.k_i, self.k_d)
    }

    /// The current integral accumulation.
    pub fn integral(&self) -> f64 {
        self.integral
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clock::SimClock;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_proportional_only_on_first_call() {
        let clock = SimClock::new();
        let mut pid = PidController::new(2.0, 10.0, 10.0);

        // No dt on the first call, so only the P term contributes
        assert_eq!(pid.step(1.5, &clock), 3.0);

        // Same instant again, still no dt
        assert_eq!(pid.step(1.5, &clock), 3.0);
        assert_eq!(pid.integral(), 0.0);
    }

    #[test]
    fn test_integral_and_derivative() {
        let mut clock = SimClock::new();
        let mut pid = PidController::new(1.0, 0.5, 0.1);

        pid.step(1.0, &clock);

        clock.advance_s(0.5);
        // int = 2 * 0.5 = 1, deriv = (2 - 1) / 0.5 = 2
        let out = pid.step(2.0, &clock);
        assert_abs_diff_eq!(pid.integral(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out, 2.0 + 0.5 * 1.0 + 0.1 * 2.0, epsilon = 1e-9);

        clock.advance_s(0.25);
        // int = 1 + 2 * 0.25 = 1.5, deriv = 0
        let out = pid.step(2.0, &clock);
        assert_abs_diff_eq!(out, 2.0 + 0.5 * 1.5, epsilon = 1e-9);
    }

    #[test]
    fn test_reset_keeps_gains() {
        let mut clock = SimClock::new();
        let mut pid = PidController::new(1.0, 1.0, 1.0);

        pid.step(1.0, &clock);
        clock.advance_s(1.0);
        pid.step(1.0, &clock);
        assert!(pid.integral() > 0.0);

        pid.reset();
        assert_eq!(pid.integral(), 0.0);
        assert_eq!(pid.gains(), (1.0, 1.0, 1.0));

        // After reset the next call is a first call again
        clock.advance_s(1.0);
        assert_eq!(pid.step(3.0, &clock), 3.0);
    }

    #[test]
    fn test_update_keeps_state() {
        let mut clock = SimClock::new();
        let mut pid = PidController::new(1.0, 1.0, 0.0);

        pid.step(1.0, &clock);
        clock.advance_s(1.0);
        pid.step(1.0, &clock);
        let int = pid.integral();

        pid.update(0.0, 2.0, 0.0);
        assert_eq!(pid.gains(), (0.0, 2.0, 0.0));
        assert_eq!(pid.integral(), int);

        clock.advance_s(1.0);
        // int = 2, out = 2 * 2
        assert_abs_diff_eq!(pid.step(1.0, &clock), 4.0, epsilon = 1e-9);
    }
}
