//! Error types for statistics collection and persistence

use thiserror::Error;

/// Errors related to run and trial statistics
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("No samples recorded for '{stage}'")]
    InsufficientData { stage: String },

    #[error("Invalid sample {value} for '{metric}': expected a finite, non-negative value")]
    InvalidSample { metric: String, value: f64 },

    #[error("Metric not found: {0}")]
    NotFound(String),

    #[error("Column mismatch: expected [{}], found [{}]", expected.join(", "), found.join(", "))]
    ColumnMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Run {0} is already present in the trial table")]
    DuplicateRun(usize),

    #[error("Trial table is finalized and cannot accept more runs")]
    Finalized,

    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
