//! Patient pathways, arrival generators and run controllers.
//!
//! This crate turns a [`ScenarioConfig`] into running simulation processes on
//! top of `patientflow-core`, and collects their statistics with
//! `patientflow-metrics`:
//!
//! - [`config`]: serde/TOML scenario description and its validation.
//! - [`pathway`]: the ordered steps a patient follows.
//! - [`arrivals`]: exponential arrival generators that create patients.
//! - [`unavailability`]: periodic server absences.
//! - [`model`]: [`single_run`] and [`trial`].
//! - [`scenarios`]: bundled presets.
//!
//! ```
//! use patientflow_components::{scenarios, trial};
//!
//! let config = scenarios::weight_loss_clinic();
//! let table = trial(&config, 3).unwrap();
//! assert_eq!(table.len(), 3);
//! let waits = table.aggregate("Mean_Q_Time_Nurse_Consultation").unwrap();
//! assert!(waits.min <= waits.mean && waits.mean <= waits.max);
//! ```

pub mod arrivals;
pub mod config;
mod context;
pub mod error;
pub mod model;
pub mod pathway;
pub mod patient;
pub mod pool;
pub mod scenarios;
pub mod unavailability;
pub mod validate;

pub use arrivals::ArrivalGenerator;
pub use config::{
    stage_metric, ArrivalStreamConfig, ResourceConfig, ScenarioConfig, StepConfig,
    UnavailabilityConfig, TIME_IN_SYSTEM,
};
pub use error::{ConfigError, RunError, TrialError};
pub use model::{run_trial, single_run, single_run_detailed, trial, RunReport};
pub use pathway::{Pathway, Step};
pub use patient::{Patient, PatientState, PatientTable, StageRecord};
pub use pool::{ResourcePool, Server};
pub use scenarios::{preset, PRESET_NAMES};
pub use unavailability::UnavailabilityProcess;
pub use validate::{
    validate_finite, validate_non_empty, validate_non_negative, validate_positive,
    validate_range, Validate, ValidationResult,
};
