//! Statistics for patient-flow simulations
//!
//! This crate collects per-run samples, reduces them to per-run means, gathers
//! replications into a trial table and persists that table as CSV or JSON.

pub mod collector;
pub mod error;
pub mod export;
pub mod run_result;
pub mod summary;
pub mod trial;

pub use collector::{SharedCollector, StatisticsCollector};
pub use error::MetricsError;
pub use export::csv::{escape_csv, import_csv, CsvExporter};
pub use export::json::JsonExporter;
pub use export::{export_csv, export_json, TrialExporter};
pub use run_result::{mean_column, RunResult};
pub use summary::Summary;
pub use trial::TrialResultTable;
