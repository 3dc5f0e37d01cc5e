//! Structured logging for patient-flow simulations
//!
//! # How to Control Terminal Logging Output
//!
//! ## 1. Use `init_detailed_simulation_logging()` (Recommended for debugging)
//! ```rust
//! use patientflow_core::init_detailed_simulation_logging;
//! init_detailed_simulation_logging();
//! ```
//! - Shows **all** log levels, pretty-printed
//!
//! ## 2. Use `init_simulation_logging_with_level()` for specific levels
//! ```rust
//! use patientflow_core::init_simulation_logging_with_level;
//! init_simulation_logging_with_level("debug");
//! ```
//!
//! ## 3. Use Environment Variables (Most flexible)
//! ```bash
//! RUST_LOG=debug patientflow run --preset ed_triage
//! RUST_LOG=patientflow_core::resource=trace patientflow run --preset gp_surgery
//! ```
//! `RUST_LOG` always wins over the level passed in code.
//!
//! ## 4. Log Level Guidelines:
//! - **TRACE**: every step, queue entry and timer
//! - **DEBUG**: process spawns, unit transfers, patient departures
//! - **INFO**: run and trial progress
//! - **WARN**: misuse that the engine recovers from
//! - **ERROR**: failed replications
//!
//! Initialisation is idempotent: a second call leaves the first subscriber in
//! place.

use crate::SimTime;
use tracing::{error, info, warn, Span};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging for the simulation with sensible defaults
pub fn init_simulation_logging() {
    init_simulation_logging_with_level("info")
}

/// Initialize logging with a specific level
///
/// # Arguments
/// * `level` - Log level: "trace", "debug", "info", "warn", or "error"
pub fn init_simulation_logging_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{level},patientflow_core::scheduler=info,patientflow_core::async_runtime=info"
        )
        .into()
    });

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter)
        .try_init();

    if installed.is_ok() {
        info!("Simulation logging initialized at level: {}", level);
    }
}

/// Initialize logging with custom configuration for advanced debugging
pub fn init_detailed_simulation_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "trace,patientflow_core=trace,patientflow_components=debug,patientflow_metrics=debug".into()
    });

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true)
                .pretty(),
        )
        .with(filter)
        .try_init();

    if installed.is_ok() {
        info!("Detailed simulation logging initialized");
    }
}

/// Create a span for tracking simulation execution
pub fn simulation_span(name: &str) -> Span {
    tracing::info_span!("simulation", name = name)
}

/// Span covering one replication of a scenario.
pub fn run_span(scenario: &str, run_index: usize, seed: u64) -> Span {
    tracing::info_span!("run", scenario = scenario, run = run_index, seed = seed)
}

/// Span covering one simulated process (a patient, an arrival stream).
pub fn process_span(kind: &str, id: u64) -> Span {
    tracing::debug_span!("process", kind = kind, id = id)
}

/// Logging utilities for common simulation events
pub mod events {
    use super::*;

    /// Log simulation start
    pub fn simulation_started(name: &str, end_time: Option<SimTime>) {
        match end_time {
            Some(end) => info!(simulation = name, end_time = %end, "Simulation started"),
            None => info!(simulation = name, "Simulation started (unbounded)"),
        }
    }

    /// Log simulation completion
    pub fn simulation_completed(name: &str, final_time: SimTime, events_processed: u64) {
        info!(
            simulation = name,
            final_time = %final_time,
            events_processed = events_processed,
            "Simulation completed"
        );
    }

    pub fn replication_completed(run_index: usize, entities: usize) {
        info!(run = run_index, entities, "Replication completed");
    }
}

/// Logging utilities for error conditions and warnings
pub mod diagnostics {
    use super::*;

    /// Processes were still waiting when the run stopped.
    pub fn processes_outstanding(count: usize, time: SimTime) {
        if count > 0 {
            tracing::debug!(count, time = %time, "Processes still suspended at end of run");
        }
    }

    /// A replication failed and the trial will abort.
    pub fn replication_failed(run_index: usize, error: &str) {
        error!(run = run_index, error = error, "Replication failed");
    }

    /// A queue grew past a threshold that usually signals an unstable model.
    pub fn excessive_queue_growth(resource: &str, queue_len: usize, threshold: usize) {
        warn!(
            resource = resource,
            queue_len = queue_len,
            threshold = threshold,
            "Queue growing excessively"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, trace};

    #[test]
    fn test_logging_initialization_is_idempotent() {
        init_simulation_logging_with_level("debug");
        init_simulation_logging();

        info!("Test info message");
        debug!("Test debug message");
        trace!("Test trace message");
    }

    #[test]
    fn test_span_creation() {
        let _sim_span = simulation_span("test_simulation").entered();
        let _run_span = run_span("ed_triage", 3, 42);
        let _process_span = process_span("patient", 7);
    }

    #[test]
    fn test_event_logging() {
        events::simulation_started("test_sim", Some(SimTime::new(10.0).unwrap()));
        events::simulation_started("test_sim", None);
        events::replication_completed(0, 12);
        events::simulation_completed("test_sim", SimTime::new(5.0).unwrap(), 100);
    }

    #[test]
    fn test_diagnostic_logging() {
        diagnostics::processes_outstanding(3, SimTime::zero());
        diagnostics::replication_failed(2, "sampling failed");
        diagnostics::excessive_queue_growth("doctor", 10_000, 1_000);
    }
}
