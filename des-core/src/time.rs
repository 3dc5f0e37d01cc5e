//! Simulation time management

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

use crate::error::SimError;

/// Simulation time in model units
///
/// `SimTime` is a point on the simulated time axis, measured from the start of
/// the run. The unit is whatever the model uses (the bundled healthcare
/// scenarios use minutes). Values are always finite and non-negative, which
/// makes the ordering total.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SimTime(f64);

impl SimTime {
    /// Time zero, the start of every run
    pub const fn zero() -> Self {
        SimTime(0.0)
    }

    /// Create a `SimTime`, rejecting negative, NaN and infinite values.
    pub fn new(value: f64) -> Result<Self, SimError> {
        if !value.is_finite() || value < 0.0 {
            return Err(SimError::InvalidTime { value });
        }
        // Normalise -0.0 so that equal times are bit-identical.
        Ok(SimTime(value + 0.0))
    }

    /// Raw value in model units
    pub const fn as_f64(&self) -> f64 {
        self.0
    }

    /// Elapsed time since `earlier`, saturating at zero.
    pub fn duration_since(&self, earlier: SimTime) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }

    /// Advance by a non-negative, finite duration.
    pub fn checked_add(&self, duration: f64) -> Result<SimTime, SimError> {
        validate_duration(duration)?;
        SimTime::new(self.0 + duration)
    }
}

/// Check that `duration` can be used to advance the clock.
pub fn validate_duration(duration: f64) -> Result<(), SimError> {
    if duration.is_finite() && duration >= 0.0 {
        Ok(())
    } else {
        Err(SimError::InvalidDuration { duration })
    }
}

impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Default for SimTime {
    fn default() -> Self {
        SimTime::zero()
    }
}

impl TryFrom<f64> for SimTime {
    type Error = SimError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        SimTime::new(value)
    }
}

impl From<SimTime> for f64 {
    fn from(time: SimTime) -> Self {
        time.0
    }
}

impl Add<SimTime> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> Self::Output {
        SimTime(self.0 + rhs.0)
    }
}

impl Sub<SimTime> for SimTime {
    type Output = f64;

    fn sub(self, rhs: SimTime) -> Self::Output {
        self.duration_since(rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={:.3}", self.0)
    }
}
