//! Error types for scenario configuration, single runs and trials

use patientflow_core::SimError;
use patientflow_metrics::MetricsError;
use thiserror::Error;

/// Errors found while loading or validating a scenario.
///
/// All of these are raised before any simulated time elapses.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Field '{field}' must be {constraint}")]
    ConstraintViolation { field: String, constraint: String },

    #[error("'{referenced_by}' refers to unknown resource '{resource}'")]
    UnknownResource {
        resource: String,
        referenced_by: String,
    },

    #[error("'{referenced_by}' needs a {expected} but '{resource}' is not one")]
    ResourceKind {
        resource: String,
        expected: String,
        referenced_by: String,
    },

    #[error("Duplicate name '{0}'")]
    DuplicateName(String),

    #[error("Unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("Failed to parse scenario: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize scenario: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that end a single replication.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Simulation error: {0}")]
    Sim(#[from] SimError),

    #[error("Statistics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("Process '{process}' failed: {source}")]
    ProcessFailed {
        process: String,
        #[source]
        source: SimError,
    },
}

/// A trial aborted because one of its replications failed.
#[derive(Debug, Error)]
#[error("Replication {replication} failed ({parameters}): {source}")]
pub struct TrialError {
    pub replication: usize,
    /// Scenario parameters in effect, as rendered by
    /// [`ScenarioConfig::describe`](crate::ScenarioConfig::describe).
    pub parameters: String,
    #[source]
    pub source: RunError,
}
