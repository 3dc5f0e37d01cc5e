//! Persistence for trial results
//!
//! CSV is the interchange format (one row per run, readable back with
//! [`csv::import_csv`]); JSON adds per-run entity counts and cross-run
//! aggregates for programmatic consumers.

pub mod csv;
pub mod json;

use crate::error::MetricsError;
use crate::trial::TrialResultTable;
use std::path::Path;

/// Trait for exporting trial results to different formats
pub trait TrialExporter {
    /// Export the table to the configured destination
    fn export(&self, table: &TrialResultTable) -> Result<(), MetricsError>;
}

/// Export a trial table to JSON format
///
/// # Example
/// ```no_run
/// use patientflow_metrics::TrialResultTable;
/// use patientflow_metrics::export::export_json;
///
/// let table = TrialResultTable::new(["Mean_Time_In_System"]);
/// // ... push runs ...
/// export_json(&table, "results/trial.json", true).unwrap();
/// ```
pub fn export_json(
    table: &TrialResultTable,
    path: impl AsRef<Path>,
    pretty: bool,
) -> Result<(), MetricsError> {
    let exporter = json::JsonExporter::new(path.as_ref(), pretty);
    exporter.export(table)
}

/// Export a trial table to CSV format
///
/// # Example
/// ```no_run
/// use patientflow_metrics::TrialResultTable;
/// use patientflow_metrics::export::export_csv;
///
/// let table = TrialResultTable::new(["Mean_Time_In_System"]);
/// // ... push runs ...
/// export_csv(&table, "results/trial.csv").unwrap();
/// ```
pub fn export_csv(table: &TrialResultTable, path: impl AsRef<Path>) -> Result<(), MetricsError> {
    let exporter = csv::CsvExporter::new(path.as_ref());
    exporter.export(table)
}
