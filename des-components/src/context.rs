//! State shared by every process of one run.

use std::cell::RefCell;

use patientflow_core::{RandomStream, SchedulerHandle, SimError, SimTime};
use patientflow_metrics::{MetricsError, SharedCollector};
use tracing::{debug, warn};

use crate::config::{stage_metric, TIME_IN_SYSTEM};
use crate::error::RunError;
use crate::patient::{Patient, PatientTable};

/// Handles and sinks for the processes of one replication.
pub(crate) struct RunContext {
    pub handle: SchedulerHandle,
    pub rng: RandomStream,
    pub collector: SharedCollector,
    pub warm_up: SimTime,
    patients: Option<RefCell<PatientTable>>,
    failure: RefCell<Option<RunError>>,
}

impl RunContext {
    pub fn new(
        handle: SchedulerHandle,
        rng: RandomStream,
        collector: SharedCollector,
        warm_up: SimTime,
        patients: Option<PatientTable>,
    ) -> Self {
        Self {
            handle,
            rng,
            collector,
            warm_up,
            patients: patients.map(RefCell::new),
            failure: RefCell::new(None),
        }
    }

    /// Records a process failure. Only the first one is kept.
    pub fn fail(&self, process: String, source: SimError) {
        warn!(process = %process, error = %source, "Process failed");
        self.fail_with(RunError::ProcessFailed { process, source });
    }

    pub fn fail_with(&self, error: RunError) {
        let mut slot = self.failure.borrow_mut();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    #[cfg(test)]
    pub fn has_failed(&self) -> bool {
        self.failure.borrow().is_some()
    }

    pub fn take_failure(&self) -> Option<RunError> {
        self.failure.borrow_mut().take()
    }

    pub fn take_patients(&self) -> Option<PatientTable> {
        self.patients.as_ref().map(|p| std::mem::take(&mut *p.borrow_mut()))
    }

    /// Hands a departed patient's records to the collector.
    ///
    /// Records are accepted only for recorded streams and only once the
    /// warm-up has passed.
    pub fn record_departure(&self, patient: Patient, record: bool) -> Result<(), MetricsError> {
        let now = self.handle.now();
        if !record || now <= self.warm_up {
            debug!(patient = patient.id, stream = %patient.stream, "Departure not recorded");
            return Ok(());
        }

        {
            let mut collector = self.collector.borrow_mut();
            for stage in &patient.stages {
                if let Some(wait) = stage.queue_time() {
                    collector.record(&stage_metric(&stage.stage), wait)?;
                }
            }
            if let Some(total) = patient.time_in_system() {
                collector.record(TIME_IN_SYSTEM, total)?;
            }
            collector.record_entity();
        }

        if let Some(table) = &self.patients {
            table.borrow_mut().push(patient);
        }
        Ok(())
    }
}
