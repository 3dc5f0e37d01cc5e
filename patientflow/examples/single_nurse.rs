//! A single-nurse clinic written directly against the engine.
//!
//! Patients arrive every 5 minutes on average and see one nurse for 6 minutes
//! on average. Run with `RUST_LOG=debug` to watch grants and releases.

use std::rc::Rc;

use patientflow::metrics::StatisticsCollector;
use patientflow::prelude::*;

fn main() {
    init_simulation_logging();

    let mut sim = Simulation::default();
    let handle = sim.scheduler_handle();
    let rng = sim.random_stream();
    let nurse = Resource::new("nurse", 1)
        .expect("capacity is positive")
        .with_clock(sim.clock());
    let stats = StatisticsCollector::with_metrics(["Q_Time_Nurse", "Time_In_System"]).shared();

    let generator = {
        let handle = handle.clone();
        let nurse = nurse.clone();
        let stats = Rc::clone(&stats);
        async move {
            loop {
                let gap = rng.exponential(5.0).expect("mean is positive");
                handle.timeout(gap).expect("gap is finite").await;

                let handle = handle.clone();
                let nurse = nurse.clone();
                let stats = Rc::clone(&stats);
                let rng = rng.clone();
                handle.clone().spawn(async move {
                    let arrived = handle.now();
                    let lease = nurse.request().await;
                    let waited = handle.now() - arrived;
                    let consult = rng.exponential(6.0).expect("mean is positive");
                    handle.timeout(consult).expect("consult is finite").await;
                    lease.release();

                    let mut stats = stats.borrow_mut();
                    stats.record("Q_Time_Nurse", waited).expect("wait is non-negative");
                    stats
                        .record("Time_In_System", handle.now() - arrived)
                        .expect("time is non-negative");
                    stats.record_entity();
                });
            }
        }
    };
    sim.spawn(generator);
    sim.execute(Executor::timed(SimTime::new(120.0).expect("valid time")));

    let stats = stats.borrow();
    println!("Patients seen: {}", stats.entities());
    for metric in ["Q_Time_Nurse", "Time_In_System"] {
        match stats.summary(metric) {
            Ok(summary) => println!("{metric}: {summary}"),
            Err(e) => println!("{metric}: {e}"),
        }
    }
    let utilization = nurse.stats().utilization(nurse.capacity(), sim.time().as_f64());
    println!("Nurse utilization: {:.2}", utilization.unwrap_or(0.0));
}
