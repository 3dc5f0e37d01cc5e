//! Error types for the simulation engine

use thiserror::Error;

/// Top-level error type for engine operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("Invalid duration {duration}: expected a finite, non-negative value")]
    InvalidDuration { duration: f64 },

    #[error("Invalid simulation time {value}: expected a finite, non-negative value")]
    InvalidTime { value: f64 },

    #[error("Resource '{name}' misconfigured: {reason}")]
    ResourceConfiguration { name: String, reason: String },

    #[error("Invalid amount {amount} for container '{name}': {reason}")]
    InvalidAmount {
        name: String,
        amount: f64,
        reason: String,
    },

    #[error("Invalid distribution: {0}")]
    InvalidDistribution(String),

    #[error("Invalid probability {value}: expected a value in [0, 1]")]
    InvalidProbability { value: f64 },

    #[error("Lease does not belong to resource '{name}'")]
    ForeignLease { name: String },
}
