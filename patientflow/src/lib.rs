//! # patientflow - patient flow discrete-event simulation
//!
//! A deterministic process-interaction simulator for healthcare queueing
//! networks, with replication trials and result persistence.
//!
//! ## Crates
//!
//! - [`core`]: simulated time, the scheduler, async processes, resources,
//!   containers and random streams.
//! - [`metrics`]: per-run statistics collection, trial tables, CSV and JSON
//!   export.
//! - [`components`]: scenario configuration, patient pathways, arrival
//!   generators, the run controller and bundled presets.
//!
//! ## Example
//!
//! ```
//! use patientflow::prelude::*;
//!
//! let config = scenarios::gp_surgery();
//! let table = trial(&config, 2).unwrap();
//! for (column, summary) in table.aggregates().unwrap() {
//!     println!("{column}: {summary}");
//! }
//! ```

pub use patientflow_components as components;
pub use patientflow_core as core;
pub use patientflow_metrics as metrics;

pub mod prelude {
    pub use patientflow_components::{
        preset, run_trial, scenarios, single_run, single_run_detailed, trial, ConfigError,
        RunError, RunReport, ScenarioConfig, TrialError, PRESET_NAMES,
    };
    pub use patientflow_core::{
        init_simulation_logging, Executor, PriorityResource, RandomStream, Resource, SimTime,
        Simulation,
    };
    pub use patientflow_metrics::{MetricsError, RunResult, Summary, TrialResultTable};
}
