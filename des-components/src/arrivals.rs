//! Arrival generators.

use std::rc::Rc;

use patientflow_core::process_span;
use tracing::{debug, Instrument};

use crate::context::RunContext;
use crate::pathway::{patient_process, Pathway};
use crate::patient::Patient;

/// Creates patients of one stream at exponentially distributed intervals.
pub struct ArrivalGenerator {
    name: String,
    mean_interarrival: f64,
    record_statistics: bool,
    pathway: Rc<Pathway>,
    ctx: Rc<RunContext>,
    generated: u64,
}

impl ArrivalGenerator {
    pub(crate) fn new(
        name: impl Into<String>,
        mean_interarrival: f64,
        record_statistics: bool,
        pathway: Pathway,
        ctx: Rc<RunContext>,
    ) -> Self {
        Self {
            name: name.into(),
            mean_interarrival,
            record_statistics,
            pathway: Rc::new(pathway),
            ctx,
            generated: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Patients created so far.
    pub fn generated(&self) -> u64 {
        self.generated
    }

    /// Runs until the clock is stopped: wait a sampled gap, then start the
    /// next patient.
    pub async fn run(mut self) {
        loop {
            let gap = match self.ctx.rng.exponential(self.mean_interarrival) {
                Ok(gap) => gap,
                Err(error) => {
                    self.ctx.fail(format!("{} arrivals", self.name), error);
                    return;
                }
            };
            match self.ctx.handle.timeout(gap) {
                Ok(timeout) => timeout.await,
                Err(error) => {
                    self.ctx.fail(format!("{} arrivals", self.name), error);
                    return;
                }
            }

            self.generated += 1;
            let patient = Patient::new(self.generated, self.name.as_str(), self.ctx.handle.now());
            debug!(
                stream = %self.name,
                patient = patient.id,
                time = %patient.arrived,
                "Patient arrived"
            );
            let span = process_span(&self.name, patient.id);
            self.ctx.handle.spawn(
                patient_process(
                    patient,
                    Rc::clone(&self.pathway),
                    Rc::clone(&self.ctx),
                    self.record_statistics,
                )
                .instrument(span),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ResourceConfig, StepConfig};
    use crate::pool::ResourcePool;
    use patientflow_core::{Executor, RandomStream, ServiceTime, SimTime, Simulation};
    use patientflow_metrics::StatisticsCollector;

    #[test]
    fn test_generator_ids_and_gaps() {
        let mut sim = Simulation::default();
        let pool = ResourcePool::build(
            &[ResourceConfig::Fifo {
                name: "desk".to_string(),
                capacity: 5,
            }],
            &sim.clock(),
        )
        .unwrap();
        let pathway = Pathway::compile(
            &[StepConfig::Service {
                stage: "Desk".to_string(),
                resource: "desk".to_string(),
                service_time: ServiceTime::Constant { value: 0.0 },
                use_priority: false,
            }],
            &pool,
        )
        .unwrap();
        let ctx = Rc::new(RunContext::new(
            sim.scheduler_handle(),
            RandomStream::seeded(11),
            StatisticsCollector::new().shared(),
            SimTime::zero(),
            None,
        ));

        let generator = ArrivalGenerator::new("walk_in", 5.0, true, pathway, ctx.clone());
        assert_eq!(generator.name(), "walk_in");
        assert_eq!(generator.generated(), 0);
        sim.spawn(generator.run());
        sim.execute(Executor::timed(SimTime::new(500.0).unwrap()));

        let entities = ctx.collector.borrow().entities();
        // Mean gap 5 over 500 time units.
        assert!((50..=150).contains(&entities), "entities = {entities}");
        assert!(!ctx.has_failed());
    }
}
