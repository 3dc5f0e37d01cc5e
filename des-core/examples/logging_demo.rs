//! Demonstration of logging in patientflow-core
//!
//! A registration desk and a priority-ordered doctor serve a handful of
//! patients while the detailed subscriber prints every grant, release and
//! timer. Set `RUST_LOG=trace` to also see each scheduler step.

use patientflow_core::{
    init_detailed_simulation_logging, process_span, simulation_span, Executor, PriorityResource,
    Resource, Simulation,
};
use tracing::{info, Instrument};

fn main() {
    init_detailed_simulation_logging();
    let _span = simulation_span("logging_demo").entered();

    let mut sim = Simulation::default();
    let desk = Resource::new("desk", 1).unwrap().with_clock(sim.clock());
    let doctor = PriorityResource::new("doctor", 1).unwrap().with_clock(sim.clock());

    for (id, priority) in [(1u64, 3i64), (2, 1), (3, 2)] {
        let handle = sim.scheduler_handle();
        let desk = desk.clone();
        let doctor = doctor.clone();
        sim.spawn(
            async move {
                let lease = desk.request().await;
                info!(time = %handle.now(), "Registering");
                handle.timeout(2.0).unwrap().await;
                lease.release();

                let lease = doctor.request(priority).await;
                info!(time = %handle.now(), priority, "Seeing doctor");
                handle.timeout(10.0).unwrap().await;
                lease.release();
                info!(time = %handle.now(), "Departed");
            }
            .instrument(process_span("patient", id)),
        );
    }

    sim.execute(Executor::unbound());

    let stats = doctor.stats();
    info!(
        grants = stats.grants,
        max_queue_len = stats.max_queue_len,
        utilization = stats.utilization(doctor.capacity(), sim.time().as_f64()),
        "Doctor summary"
    );
}
