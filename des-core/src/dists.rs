//! Random sampling for interarrival times, service times and routing decisions.
//!
//! All draws of a run come from one [`RandomStream`]. Because processes resume
//! in a deterministic order, the same seed reproduces the same run.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Exp;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Seeded random source shared by the processes of one run.
///
/// Cloning yields another handle to the same underlying generator.
#[derive(Clone)]
pub struct RandomStream {
    seed: u64,
    rng: Rc<RefCell<ChaCha8Rng>>,
}

impl RandomStream {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed,
            rng: Rc::new(RefCell::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Seed this stream was created from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Exponential draw with the given mean.
    pub fn exponential(&self, mean: f64) -> Result<f64, SimError> {
        if !mean.is_finite() || mean <= 0.0 {
            return Err(SimError::InvalidDistribution(format!(
                "exponential mean must be positive and finite, got {mean}"
            )));
        }
        let exp = Exp::new(1.0 / mean)
            .map_err(|e| SimError::InvalidDistribution(format!("exponential: {e}")))?;
        Ok(self.rng.borrow_mut().sample(exp))
    }

    /// Uniform draw in `[0, 1)`.
    pub fn uniform(&self) -> f64 {
        self.rng.borrow_mut().gen::<f64>()
    }

    /// Uniform draw in `[min, max)`; returns `min` when the bounds are equal.
    pub fn uniform_range(&self, min: f64, max: f64) -> Result<f64, SimError> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(SimError::InvalidDistribution(format!(
                "uniform bounds must be finite with min <= max, got [{min}, {max})"
            )));
        }
        if min == max {
            return Ok(min);
        }
        Ok(self.rng.borrow_mut().gen_range(min..max))
    }

    /// Uniform integer in `[min, max]`, both ends included.
    pub fn uniform_int(&self, min: i64, max: i64) -> Result<i64, SimError> {
        if min > max {
            return Err(SimError::InvalidDistribution(format!(
                "integer range is empty: [{min}, {max}]"
            )));
        }
        Ok(self.rng.borrow_mut().gen_range(min..=max))
    }

    /// Probabilistic branch: one uniform draw, compared with [`branch_taken`].
    pub fn branch(&self, probability: f64) -> Result<bool, SimError> {
        validate_probability(probability)?;
        Ok(branch_taken(self.uniform(), probability))
    }
}

impl fmt::Debug for RandomStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomStream")
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

/// Whether a branch with `probability` is taken for a uniform `draw`.
///
/// The branch is taken iff `draw < probability`; a draw exactly equal to the
/// probability takes the other path.
pub fn branch_taken(draw: f64, probability: f64) -> bool {
    draw < probability
}

pub fn validate_probability(probability: f64) -> Result<(), SimError> {
    if (0.0..=1.0).contains(&probability) {
        Ok(())
    } else {
        Err(SimError::InvalidProbability { value: probability })
    }
}

/// Distribution of a service (activity) duration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceTime {
    Exponential { mean: f64 },
    Constant { value: f64 },
    Uniform { min: f64, max: f64 },
}

impl ServiceTime {
    pub fn exponential(mean: f64) -> Self {
        ServiceTime::Exponential { mean }
    }

    /// Checks the parameters without drawing.
    pub fn validate(&self) -> Result<(), SimError> {
        match *self {
            ServiceTime::Exponential { mean } => {
                if mean.is_finite() && mean > 0.0 {
                    Ok(())
                } else {
                    Err(SimError::InvalidDistribution(format!(
                        "exponential mean must be positive and finite, got {mean}"
                    )))
                }
            }
            ServiceTime::Constant { value } => {
                if value.is_finite() && value >= 0.0 {
                    Ok(())
                } else {
                    Err(SimError::InvalidDistribution(format!(
                        "constant duration must be non-negative and finite, got {value}"
                    )))
                }
            }
            ServiceTime::Uniform { min, max } => {
                if min.is_finite() && max.is_finite() && min >= 0.0 && min <= max {
                    Ok(())
                } else {
                    Err(SimError::InvalidDistribution(format!(
                        "uniform bounds must satisfy 0 <= min <= max, got [{min}, {max})"
                    )))
                }
            }
        }
    }

    /// Expected value of the distribution.
    pub fn mean(&self) -> f64 {
        match *self {
            ServiceTime::Exponential { mean } => mean,
            ServiceTime::Constant { value } => value,
            ServiceTime::Uniform { min, max } => (min + max) / 2.0,
        }
    }

    /// Draws a duration.
    ///
    /// Fails with [`SimError::InvalidDuration`] if a misconfigured distribution
    /// produces a negative value.
    pub fn sample(&self, stream: &RandomStream) -> Result<f64, SimError> {
        let value = match *self {
            ServiceTime::Exponential { mean } => stream.exponential(mean)?,
            ServiceTime::Constant { value } => value,
            ServiceTime::Uniform { min, max } => stream.uniform_range(min, max)?,
        };
        crate::time::validate_duration(value)?;
        Ok(value)
    }
}

impl fmt::Display for ServiceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceTime::Exponential { mean } => write!(f, "exp(mean={mean})"),
            ServiceTime::Constant { value } => write!(f, "const({value})"),
            ServiceTime::Uniform { min, max } => write!(f, "uniform({min}, {max})"),
        }
    }
}
