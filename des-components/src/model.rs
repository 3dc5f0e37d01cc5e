//! Run controller: single replications and whole trials.

use std::rc::Rc;

use patientflow_core::logging::{diagnostics, events};
use patientflow_core::{
    replication_seed, run_span, Executor, SimTime, Simulation, SimulationConfig,
};
use patientflow_metrics::{RunResult, StatisticsCollector, TrialResultTable};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::arrivals::ArrivalGenerator;
use crate::config::{ScenarioConfig, UnavailabilityConfig};
use crate::context::RunContext;
use crate::error::{ConfigError, RunError, TrialError};
use crate::pathway::Pathway;
use crate::patient::PatientTable;
use crate::pool::ResourcePool;
use crate::unavailability::UnavailabilityProcess;
use crate::validate::{validate_positive, Validate};

/// Queue length above which a run logs a warning.
const QUEUE_WARNING_THRESHOLD: usize = 1_000;

/// Everything observed in one replication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub result: RunResult,
    /// Accepted patients in departure order.
    pub patients: PatientTable,
    /// Fraction of capacity in use for each server, in declaration order.
    pub utilization: Vec<(String, f64)>,
    pub seed: u64,
    pub end_time: SimTime,
    pub events_processed: u64,
}

/// Runs replication `run_index` of `config` and returns its means.
pub fn single_run(config: &ScenarioConfig, run_index: usize) -> Result<RunResult, RunError> {
    run(config, run_index, false).map(|report| report.result)
}

/// Like [`single_run`] but also keeps the accepted patients' records.
pub fn single_run_detailed(
    config: &ScenarioConfig,
    run_index: usize,
) -> Result<RunReport, RunError> {
    run(config, run_index, true)
}

fn run(config: &ScenarioConfig, run_index: usize, keep_patients: bool) -> Result<RunReport, RunError> {
    config.validate()?;
    let seed = replication_seed(config.seed, run_index as u64);
    let span = run_span(&config.name, run_index, seed);
    let _guard = span.enter();

    let mut sim = Simulation::new(SimulationConfig { seed });
    let end = SimTime::new(config.end_time())?;
    let warm_up = SimTime::new(config.warm_up)?;
    let pool = ResourcePool::build(&config.resources, &sim.clock())?;

    let collector = StatisticsCollector::with_metrics(config.metric_names()).shared();
    let patients = keep_patients.then(|| PatientTable::new(config.stage_names()));
    let ctx = Rc::new(RunContext::new(
        sim.scheduler_handle(),
        sim.random_stream(),
        Rc::clone(&collector),
        warm_up,
        patients,
    ));

    for stream in &config.arrivals {
        let pathway = Pathway::compile(&stream.pathway, &pool)?;
        let generator = ArrivalGenerator::new(
            stream.name.as_str(),
            stream.mean_interarrival,
            stream.record_statistics,
            pathway,
            Rc::clone(&ctx),
        );
        sim.spawn(generator.run());
    }
    for rule in &config.unavailability {
        sim.spawn(unavailability(rule, &pool, &ctx)?.run());
    }

    events::simulation_started(&config.name, Some(end));
    sim.execute(Executor::timed(end));
    events::simulation_completed(&config.name, sim.time(), sim.events_processed());
    diagnostics::processes_outstanding(sim.task_count(), sim.time());
    for server in pool.servers() {
        if server.queue_len() > QUEUE_WARNING_THRESHOLD {
            diagnostics::excessive_queue_growth(
                &server.name(),
                server.queue_len(),
                QUEUE_WARNING_THRESHOLD,
            );
        }
    }

    if let Some(error) = ctx.take_failure() {
        diagnostics::replication_failed(run_index, &error.to_string());
        return Err(error);
    }

    let result = RunResult::from_collector(run_index, &collector.borrow())?;
    events::replication_completed(run_index, collector.borrow().entities());

    Ok(RunReport {
        result,
        patients: ctx.take_patients().unwrap_or_default(),
        utilization: pool.utilization(end.as_f64()),
        seed,
        end_time: sim.time(),
        events_processed: sim.events_processed(),
    })
}

fn unavailability(
    rule: &UnavailabilityConfig,
    pool: &ResourcePool,
    ctx: &Rc<RunContext>,
) -> Result<UnavailabilityProcess, ConfigError> {
    let server = pool
        .server(&rule.resource)
        .cloned()
        .ok_or_else(|| ConfigError::UnknownResource {
            resource: rule.resource.clone(),
            referenced_by: "unavailability".to_string(),
        })?;
    Ok(UnavailabilityProcess::new(
        server,
        rule.every,
        rule.duration,
        rule.priority,
        Rc::clone(ctx),
    ))
}

/// Runs replications `0..replications` and collects their results.
///
/// The first failing replication aborts the trial; the error names the
/// replication and the parameters in effect.
#[instrument(skip(config), fields(scenario = %config.name))]
pub fn trial(
    config: &ScenarioConfig,
    replications: usize,
) -> Result<TrialResultTable, TrialError> {
    let abort = |replication: usize, source: RunError| TrialError {
        replication,
        parameters: config.describe(),
        source,
    };
    config.validate().map_err(|e| abort(0, e.into()))?;
    validate_positive("replications", replications).map_err(|e| abort(0, e.into()))?;

    info!(replications, "Starting trial");
    let mut table = TrialResultTable::new(config.columns());
    for run_index in 0..replications {
        let result = single_run(config, run_index).map_err(|e| {
            warn!(run = run_index, error = %e, "Trial aborted");
            abort(run_index, e)
        })?;
        table
            .push(result)
            .map_err(|e| abort(run_index, e.into()))?;
    }
    table.finalize();
    info!(replications = table.len(), "Trial completed");
    Ok(table)
}

/// Runs `config.replications` replications.
pub fn run_trial(config: &ScenarioConfig) -> Result<TrialResultTable, TrialError> {
    trial(config, config.replications)
}
