//! Descriptive statistics over a set of samples.

use serde::{Deserialize, Serialize};
use std::fmt;

/// z-value for a two-sided 95% normal confidence interval.
const Z_95: f64 = 1.96;

/// Count, mean, spread and 95% confidence half-width of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation (n - 1 denominator); zero for a single sample.
    pub std_dev: f64,
    /// Half-width of the normal-approximation 95% confidence interval.
    pub ci95_half_width: f64,
}

impl Summary {
    /// Summarises `samples`, or returns `None` when there are none.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let count = samples.len();
        let n = count as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let (min, max) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        let std_dev = if count > 1 {
            let ss: f64 = samples.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        // Rounding can push the mean a hair outside the observed range.
        let mean = mean.clamp(min, max);

        Some(Self {
            count,
            mean,
            min,
            max,
            std_dev,
            ci95_half_width: Z_95 * std_dev / n.sqrt(),
        })
    }

    /// Lower and upper bounds of the 95% confidence interval.
    pub fn ci95(&self) -> (f64, f64) {
        (self.mean - self.ci95_half_width, self.mean + self.ci95_half_width)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mean={:.3} min={:.3} max={:.3} sd={:.3} ±{:.3} (n={})",
            self.mean, self.min, self.max, self.std_dev, self.ci95_half_width, self.count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_has_no_summary() {
        assert!(Summary::from_samples(&[]).is_none());
    }

    #[test]
    fn test_single_sample() {
        let s = Summary::from_samples(&[4.0]).unwrap();
        assert_eq!(s.count, 1);
        assert_eq!(s.mean, 4.0);
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.ci95_half_width, 0.0);
    }

    #[test]
    fn test_known_values() {
        let s = Summary::from_samples(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(s.mean, 5.0);
        assert_eq!(s.min, 2.0);
        assert_eq!(s.max, 9.0);
        assert!((s.std_dev - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        let (lo, hi) = s.ci95();
        assert!(lo < s.mean && s.mean < hi);
    }

    proptest! {
        #[test]
        fn mean_between_min_and_max(samples in proptest::collection::vec(0.0f64..1e6, 1..200)) {
            let s = Summary::from_samples(&samples).unwrap();
            prop_assert!(s.min <= s.mean && s.mean <= s.max);
            prop_assert!(s.std_dev >= 0.0);
            prop_assert_eq!(s.count, samples.len());
        }
    }
}
