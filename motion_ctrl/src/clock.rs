//! Time sources

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::{Duration, Instant};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A monotonic source of time.
///
/// Time-aware controllers read the clock once at the start of each step and
/// use the difference between consecutive readings as their integration step.
pub trait Clock {
    /// Get the current instant.
    fn now(&self) -> Instant;
}

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// The system's monotonic clock.
#[derive(Debug, Default, Copy, Clone)]
pub struct MonotonicClock;

/// A clock which only moves when told to.
#[derive(Debug, Copy, Clone)]
pub struct SimClock {
    epoch: Instant,
    elapsed: Duration,
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl SimClock {
    /// Create a new simulated clock with zero elapsed time.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            elapsed: Duration::default(),
        }
    }

    /// Move the clock forward by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        self.elapsed += dt;
    }

    /// Move the clock forward by `dt_s` seconds. Negative values are ignored.
    pub fn advance_s(&mut self, dt_s: f64) {
        if dt_s > 0.0 {
            self.advance(Duration::from_secs_f64(dt_s));
        }
    }

    /// Number of seconds since the clock was created.
    pub fn elapsed_s(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        self.epoch + self.elapsed
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sim_clock() {
        let mut clock = SimClock::new();
        let t0 = clock.now();

        clock.advance_s(0.25);
        clock.advance(Duration::from_millis(250));
        clock.advance_s(-1.0);

        assert_eq!(clock.now() - t0, Duration::from_millis(500));
        assert_eq!(clock.elapsed_s(), 0.5);
    }
}
