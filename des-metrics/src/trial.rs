//! Cross-replication results.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MetricsError;
use crate::export;
use crate::run_result::RunResult;
use crate::summary::Summary;

/// One row per replication over a fixed set of columns.
///
/// Rows are accepted until [`finalize`](Self::finalize), which sorts them by
/// run index and freezes the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResultTable {
    columns: Vec<String>,
    rows: Vec<RunResult>,
    finalized: bool,
}

impl TrialResultTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            finalized: false,
        }
    }

    /// Appends a run. Its columns must match the table's, in order.
    pub fn push(&mut self, row: RunResult) -> Result<(), MetricsError> {
        if self.finalized {
            return Err(MetricsError::Finalized);
        }
        if !row.columns().eq(self.columns.iter().map(String::as_str)) {
            return Err(MetricsError::ColumnMismatch {
                expected: self.columns.clone(),
                found: row.columns().map(str::to_string).collect(),
            });
        }
        if self.rows.iter().any(|r| r.run_index == row.run_index) {
            return Err(MetricsError::DuplicateRun(row.run_index));
        }
        debug!(run = row.run_index, "Run added to trial table");
        self.rows.push(row);
        Ok(())
    }

    /// Sorts rows by run index and rejects further pushes.
    pub fn finalize(&mut self) {
        self.rows.sort_by_key(|r| r.run_index);
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[RunResult] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of `column` across runs, in row order.
    pub fn column(&self, column: &str) -> Result<Vec<f64>, MetricsError> {
        let index = self
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| MetricsError::NotFound(column.to_string()))?;
        Ok(self.rows.iter().map(|r| r.values[index].1).collect())
    }

    /// Cross-run statistics for `column`.
    pub fn aggregate(&self, column: &str) -> Result<Summary, MetricsError> {
        let values = self.column(column)?;
        Summary::from_samples(&values).ok_or_else(|| MetricsError::InsufficientData {
            stage: column.to_string(),
        })
    }

    /// Cross-run statistics for every column, in column order.
    pub fn aggregates(&self) -> Result<Vec<(String, Summary)>, MetricsError> {
        self.columns
            .iter()
            .map(|c| Ok((c.clone(), self.aggregate(c)?)))
            .collect()
    }

    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<(), MetricsError> {
        export::export_csv(self, path)
    }

    /// Reads a table written by [`export_csv`](Self::export_csv). The result is
    /// finalized.
    pub fn import_csv(path: impl AsRef<Path>) -> Result<Self, MetricsError> {
        export::csv::import_csv(path)
    }

    pub fn export_json(&self, path: impl AsRef<Path>, pretty: bool) -> Result<(), MetricsError> {
        export::export_json(self, path, pretty)
    }
}
