//! Validation helpers for scenario configuration
//!
//! Every configuration type implements [`Validate`]. Validation runs when a
//! scenario is loaded and again at the start of each run, so a bad value is
//! reported before the clock starts.

use crate::error::ConfigError;

pub type ValidationResult<T> = Result<T, ConfigError>;

/// Trait for validating configurations
pub trait Validate {
    /// Checks that all field values are valid and consistent with each other.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    fn validate(&self) -> ValidationResult<()>;
}

/// Helper for validating numeric ranges
pub fn validate_range<T: PartialOrd + std::fmt::Display>(
    field: &str,
    value: T,
    min: T,
    max: T,
) -> ValidationResult<()> {
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::ConstraintViolation {
            field: field.to_string(),
            constraint: format!("between {min} and {max}"),
        })
    }
}

/// Helper for validating that a value is positive
///
/// Values that do not compare (NaN) are rejected.
pub fn validate_positive<T: PartialOrd + Default + std::fmt::Display>(
    field: &str,
    value: T,
) -> ValidationResult<()> {
    if value > T::default() {
        Ok(())
    } else {
        Err(ConfigError::ConstraintViolation {
            field: field.to_string(),
            constraint: "positive".to_string(),
        })
    }
}

/// Helper for validating that a value is non-negative
pub fn validate_non_negative<T: PartialOrd + Default + std::fmt::Display>(
    field: &str,
    value: T,
) -> ValidationResult<()> {
    if value >= T::default() {
        Ok(())
    } else {
        Err(ConfigError::ConstraintViolation {
            field: field.to_string(),
            constraint: "non-negative".to_string(),
        })
    }
}

pub fn validate_finite(field: &str, value: f64) -> ValidationResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("{value} is not finite"),
        })
    }
}

/// Helper for validating that a string is not empty
pub fn validate_non_empty(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: "cannot be empty".to_string(),
        })
    } else {
        Ok(())
    }
}
