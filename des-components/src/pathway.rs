//! Patient pathways and the patient process that walks them.
//!
//! A [`Pathway`] is compiled once per run from the scenario's step list, with
//! every resource name resolved to its handle. Each patient process then
//! interprets it step by step, suspending at resource queues and service
//! holds.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use patientflow_core::{branch_taken, Container, ServiceTime, SimError};
use tracing::{debug, trace};

use crate::config::StepConfig;
use crate::context::RunContext;
use crate::error::ConfigError;
use crate::patient::Patient;
use crate::pool::{ResourcePool, Server, UNPRIORITISED};

/// One executable step.
#[derive(Debug, Clone)]
pub enum Step {
    Service {
        stage: String,
        server: Server,
        service_time: ServiceTime,
        use_priority: bool,
    },
    Draw {
        stage: String,
        container: Container,
        amount: ServiceTime,
    },
    AssignPriority {
        min: i64,
        max: i64,
    },
    Branch {
        name: String,
        probability: f64,
        taken: Pathway,
        not_taken: Pathway,
    },
}

/// Ordered steps a patient follows from arrival to departure.
#[derive(Debug, Clone, Default)]
pub struct Pathway {
    steps: Vec<Step>,
}

type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SimError>> + 'a>>;

impl Pathway {
    /// Resolves `steps` against `pool`.
    pub fn compile(steps: &[StepConfig], pool: &ResourcePool) -> Result<Self, ConfigError> {
        let steps = steps
            .iter()
            .map(|step| compile_step(step, pool))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Runs every step for `patient`, leaving the clock at its last release.
    pub(crate) fn walk<'a>(
        &'a self,
        ctx: &'a RunContext,
        patient: &'a mut Patient,
    ) -> StepFuture<'a> {
        Box::pin(async move {
            for step in &self.steps {
                run_step(step, ctx, patient).await?;
            }
            Ok(())
        })
    }
}

fn compile_step(step: &StepConfig, pool: &ResourcePool) -> Result<Step, ConfigError> {
    Ok(match step {
        StepConfig::Service {
            stage,
            resource,
            service_time,
            use_priority,
        } => Step::Service {
            stage: stage.clone(),
            server: pool
                .server(resource)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownResource {
                    resource: resource.clone(),
                    referenced_by: stage.clone(),
                })?,
            service_time: *service_time,
            use_priority: *use_priority,
        },
        StepConfig::Draw {
            stage,
            container,
            amount,
        } => Step::Draw {
            stage: stage.clone(),
            container: pool.container(container).cloned().ok_or_else(|| {
                ConfigError::UnknownResource {
                    resource: container.clone(),
                    referenced_by: stage.clone(),
                }
            })?,
            amount: *amount,
        },
        StepConfig::AssignPriority { min, max } => Step::AssignPriority {
            min: *min,
            max: *max,
        },
        StepConfig::Branch {
            name,
            probability,
            taken,
            not_taken,
        } => Step::Branch {
            name: name.clone(),
            probability: *probability,
            taken: Pathway::compile(taken, pool)?,
            not_taken: Pathway::compile(not_taken, pool)?,
        },
    })
}

async fn run_step(step: &Step, ctx: &RunContext, patient: &mut Patient) -> Result<(), SimError> {
    match step {
        Step::Service {
            stage,
            server,
            service_time,
            use_priority,
        } => {
            patient.enter_queue(stage, ctx.handle.now());
            let priority = match (*use_priority, patient.priority) {
                (true, Some(p)) => p,
                _ => UNPRIORITISED,
            };
            let lease = server.request(priority).await;
            let duration = service_time.sample(&ctx.rng)?;
            patient.start_service(ctx.handle.now(), duration);
            trace!(patient = patient.id, stage = %stage, duration, "Service started");
            ctx.handle.timeout(duration)?.await;
            lease.release();
            patient.finish_stage(ctx.handle.now());
        }
        Step::Draw {
            stage,
            container,
            amount,
        } => {
            patient.enter_queue(stage, ctx.handle.now());
            let amount = amount.sample(&ctx.rng)?;
            container.get(amount).await?;
            patient.start_service(ctx.handle.now(), amount);
            ctx.handle.timeout(amount)?.await;
            container.put(amount).await?;
            patient.finish_stage(ctx.handle.now());
        }
        Step::AssignPriority { min, max } => {
            let priority = ctx.rng.uniform_int(*min, *max)?;
            patient.priority = Some(priority);
        }
        Step::Branch {
            name,
            probability,
            taken,
            not_taken,
        } => {
            let draw = ctx.rng.uniform();
            let decision = branch_taken(draw, *probability);
            debug!(patient = patient.id, branch = %name, draw, taken = decision, "Branch decided");
            patient.record_branch(name, decision);
            let next = if decision { taken } else { not_taken };
            next.walk(ctx, patient).await?;
        }
    }
    Ok(())
}

/// Lifecycle of one patient: walk the pathway, depart, hand over records.
pub(crate) async fn patient_process(
    mut patient: Patient,
    pathway: Rc<Pathway>,
    ctx: Rc<RunContext>,
    record: bool,
) {
    if let Err(error) = pathway.walk(&ctx, &mut patient).await {
        ctx.fail(format!("{} patient {}", patient.stream, patient.id), error);
        return;
    }
    patient.depart(ctx.handle.now());
    trace!(
        patient = patient.id,
        time_in_system = patient.time_in_system(),
        "Patient departed"
    );
    if let Err(error) = ctx.record_departure(patient, record) {
        ctx.fail_with(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceConfig;
    use patientflow_core::{Executor, RandomStream, SimTime, Simulation};
    use patientflow_metrics::StatisticsCollector;

    fn setup(resources: &[ResourceConfig]) -> (Simulation, ResourcePool, Rc<RunContext>) {
        setup_with_warm_up(resources, 0.0)
    }

    fn setup_with_warm_up(
        resources: &[ResourceConfig],
        warm_up: f64,
    ) -> (Simulation, ResourcePool, Rc<RunContext>) {
        let sim = Simulation::default();
        let pool = ResourcePool::build(resources, &sim.clock()).unwrap();
        let ctx = Rc::new(RunContext::new(
            sim.scheduler_handle(),
            RandomStream::seeded(7),
            StatisticsCollector::new().shared(),
            SimTime::new(warm_up).unwrap(),
            None,
        ));
        (sim, pool, ctx)
    }

    fn nurse() -> ResourceConfig {
        ResourceConfig::Fifo {
            name: "nurse".to_string(),
            capacity: 1,
        }
    }

    fn consult(value: f64) -> StepConfig {
        service("Nurse", value)
    }

    fn service(stage: &str, value: f64) -> StepConfig {
        StepConfig::Service {
            stage: stage.to_string(),
            resource: "nurse".to_string(),
            service_time: ServiceTime::Constant { value },
            use_priority: false,
        }
    }

    #[test]
    fn test_compile_rejects_unknown_resource() {
        let (_sim, pool, _ctx) = setup(&[nurse()]);
        let steps = vec![StepConfig::Service {
            stage: "Doctor".to_string(),
            resource: "doctor".to_string(),
            service_time: ServiceTime::Constant { value: 1.0 },
            use_priority: false,
        }];
        assert!(matches!(
            Pathway::compile(&steps, &pool),
            Err(ConfigError::UnknownResource { .. })
        ));
    }

    #[test]
    fn test_patients_share_one_nurse() {
        let (mut sim, pool, ctx) = setup(&[nurse()]);
        let pathway = Rc::new(Pathway::compile(&[consult(6.0)], &pool).unwrap());
        for id in 1..=2 {
            let patient = Patient::new(id, "patients", SimTime::zero());
            sim.spawn(patient_process(patient, pathway.clone(), ctx.clone(), true));
        }
        sim.execute(Executor::unbound());

        assert_eq!(sim.time(), SimTime::new(12.0).unwrap());
        let collector = ctx.collector.borrow();
        assert_eq!(collector.samples("Q_Time_Nurse"), Some(&[0.0, 6.0][..]));
        assert_eq!(collector.samples("Time_In_System"), Some(&[6.0, 12.0][..]));
        assert_eq!(collector.entities(), 2);
    }

    #[test]
    fn test_branch_follows_probability() {
        let (mut sim, pool, ctx) = setup(&[nurse()]);
        let steps = vec![StepConfig::Branch {
            name: "always".to_string(),
            probability: 1.0,
            taken: vec![consult(2.0)],
            not_taken: vec![],
        }];
        let pathway = Rc::new(Pathway::compile(&steps, &pool).unwrap());
        sim.spawn(patient_process(
            Patient::new(1, "patients", SimTime::zero()),
            pathway,
            ctx.clone(),
            true,
        ));
        sim.execute(Executor::unbound());
        assert_eq!(ctx.collector.borrow().count("Q_Time_Nurse"), 1);

        let (mut sim, pool, ctx) = setup(&[nurse()]);
        let steps = vec![StepConfig::Branch {
            name: "never".to_string(),
            probability: 0.0,
            taken: vec![consult(2.0)],
            not_taken: vec![service("Desk", 1.0)],
        }];
        let pathway = Rc::new(Pathway::compile(&steps, &pool).unwrap());
        sim.spawn(patient_process(
            Patient::new(1, "patients", SimTime::zero()),
            pathway,
            ctx.clone(),
            true,
        ));
        sim.execute(Executor::unbound());
        assert_eq!(ctx.collector.borrow().count("Q_Time_Nurse"), 0);
        assert_eq!(ctx.collector.borrow().count("Q_Time_Desk"), 1);
        assert_eq!(ctx.collector.borrow().entities(), 1);
    }

    #[test]
    fn test_departure_at_warm_up_is_not_recorded() {
        let (mut sim, pool, ctx) = setup_with_warm_up(&[nurse()], 2.0);
        let pathway = Rc::new(Pathway::compile(&[consult(2.0)], &pool).unwrap());
        for id in 1..=2 {
            let patient = Patient::new(id, "patients", SimTime::zero());
            sim.spawn(patient_process(patient, pathway.clone(), ctx.clone(), true));
        }
        sim.execute(Executor::unbound());

        // Patient 1 leaves exactly at the warm-up, patient 2 at 4.0.
        let collector = ctx.collector.borrow();
        assert_eq!(collector.samples("Q_Time_Nurse"), Some(&[2.0][..]));
        assert_eq!(collector.samples("Time_In_System"), Some(&[4.0][..]));
        assert_eq!(collector.entities(), 1);
    }

    #[test]
    fn test_draw_holds_container_level() {
        let (mut sim, pool, ctx) = setup(&[ResourceConfig::Container {
            name: "minutes".to_string(),
            capacity: 10.0,
            init: 10.0,
        }]);
        let steps = vec![StepConfig::Draw {
            stage: "Visit".to_string(),
            container: "minutes".to_string(),
            amount: ServiceTime::Constant { value: 6.0 },
        }];
        let pathway = Rc::new(Pathway::compile(&steps, &pool).unwrap());
        for id in 1..=2 {
            let patient = Patient::new(id, "visits", SimTime::zero());
            sim.spawn(patient_process(patient, pathway.clone(), ctx.clone(), true));
        }
        sim.execute(Executor::unbound());

        // The second visit waits until the first puts its 6 units back.
        assert_eq!(
            ctx.collector.borrow().samples("Q_Time_Visit"),
            Some(&[0.0, 6.0][..])
        );
        assert_eq!(pool.container("minutes").map(Container::level), Some(10.0));
    }

    #[test]
    fn test_sampling_error_fails_run() {
        let (mut sim, pool, ctx) = setup(&[nurse()]);
        let steps = vec![StepConfig::Service {
            stage: "Nurse".to_string(),
            resource: "nurse".to_string(),
            service_time: ServiceTime::Constant { value: -1.0 },
            use_priority: false,
        }];
        let pathway = Rc::new(Pathway::compile(&steps, &pool).unwrap());
        sim.spawn(patient_process(
            Patient::new(4, "patients", SimTime::zero()),
            pathway,
            ctx.clone(),
            true,
        ));
        sim.execute(Executor::unbound());

        assert!(ctx.has_failed());
        let failure = ctx.take_failure();
        assert!(matches!(
            failure,
            Some(crate::RunError::ProcessFailed { ref process, .. }) if process == "patients patient 4"
        ));
        // The lease was returned when the process ended.
        assert_eq!(pool.server("nurse").map(Server::in_use), Some(0));
    }
}
