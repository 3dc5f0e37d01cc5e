//! Core discrete event simulation engine.
//!
//! This crate provides the building blocks for process-interaction simulation of
//! queueing networks: simulated time, a deterministic event scheduler, an async
//! runtime for simulated processes, and the shared resources those processes
//! compete for.
//!
//! # Architecture Overview
//!
//! - [`Simulation`]: owns the scheduler and the suspended processes. Use it to
//!   spawn processes and run the model.
//! - [`SchedulerHandle`]: cloneable handle given to processes so they can read
//!   the clock, wait for simulated time and spawn other processes.
//! - [`Resource`], [`PriorityResource`] and [`Container`]: shared capacity that
//!   processes queue for.
//! - [`RandomStream`]: seeded random source for interarrival and service times.
//!
//! # Basic Usage
//!
//! ```
//! use patientflow_core::{Execute, Executor, Resource, SimTime, Simulation};
//!
//! let mut simulation = Simulation::default();
//! let handle = simulation.scheduler_handle();
//! let nurse = Resource::new("nurse", 1).unwrap();
//!
//! for _ in 0..2 {
//!     let handle = handle.clone();
//!     let nurse = nurse.clone();
//!     simulation.spawn(async move {
//!         let lease = nurse.request().await;
//!         handle.timeout(6.0).unwrap().await;
//!         drop(lease);
//!     });
//! }
//!
//! simulation.execute(Executor::unbound());
//! assert_eq!(simulation.time(), SimTime::new(12.0).unwrap());
//! ```
//!
//! # Time Model
//!
//! All timing uses [`SimTime`], which represents simulation time in model units
//! (not wall-clock time). Events due at the same instant run in the order they
//! were scheduled, so a run is fully determined by its random stream.

pub mod async_runtime;
pub mod container;
pub mod dists;
pub mod error;
pub mod execute;
pub mod logging;
pub mod resource;
pub mod scheduler;
pub mod seeds;
pub mod time;
pub mod types;
pub mod waker;

use std::future::Future;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, trace};

pub use async_runtime::{DesRuntime, SchedulerHandle, Timeout};
pub use container::{Container, ContainerGet, ContainerPut};
pub use dists::{branch_taken, RandomStream, ServiceTime};
pub use error::SimError;
pub use execute::{Execute, Executor};
pub use logging::{
    init_detailed_simulation_logging, init_simulation_logging,
    init_simulation_logging_with_level, process_span, run_span, simulation_span,
};
pub use resource::{Lease, PriorityResource, Request, Resource, ResourceStats};
pub use scheduler::{ClockRef, EventEntry, Scheduler};
pub use seeds::replication_seed;
pub use time::SimTime;
pub use types::{EventId, TaskId};

use async_runtime::RuntimeShared;

/// Settings fixed for the lifetime of one [`Simulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seed for the simulation's root random stream.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

/// Simulation struct that puts the scheduler and the processes together.
///
/// See the [crate-level documentation](index.html) for more information.
pub struct Simulation {
    shared: Rc<RuntimeShared>,
    runtime: DesRuntime,
    config: SimulationConfig,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            shared: RuntimeShared::new(),
            runtime: DesRuntime::new(),
            config,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Random stream seeded from [`SimulationConfig::seed`].
    ///
    /// Every call returns a fresh stream starting at the same point.
    pub fn random_stream(&self) -> RandomStream {
        RandomStream::seeded(self.config.seed)
    }

    /// Returns a cloneable handle for processes.
    #[must_use]
    pub fn scheduler_handle(&self) -> SchedulerHandle {
        SchedulerHandle::new(Rc::clone(&self.shared))
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.shared.scheduler.borrow().time()
    }

    /// Returns a ClockRef for reading the simulation time.
    pub fn clock(&self) -> ClockRef {
        self.shared.scheduler.borrow().clock()
    }

    /// Starts a process at the current simulation time.
    pub fn spawn<F>(&mut self, future: F) -> TaskId
    where
        F: Future<Output = ()> + 'static,
    {
        let task_id = self.scheduler_handle().spawn(future);
        self.runtime.adopt_spawned(&self.shared);
        task_id
    }

    /// Performs one step of the simulation. Returns `true` if there was in fact an event
    /// available to process, and `false` otherwise, which signifies that the simulation
    /// ended.
    pub fn step(&mut self) -> bool {
        self.shared.flush_wakes();
        self.runtime.adopt_spawned(&self.shared);

        let event = self.shared.scheduler.borrow_mut().pop();
        let Some(event) = event else {
            return false;
        };

        trace!(
            event_id = %event.id(),
            task_id = %event.task(),
            time = %event.time(),
            "Processing simulation step"
        );

        if self.runtime.poll_task(event.task(), &self.shared).is_none() {
            trace!(task_id = %event.task(), "Event for finished process ignored");
        }

        self.runtime.adopt_spawned(&self.shared);
        self.shared.flush_wakes();
        true
    }

    /// Runs the entire simulation.
    ///
    /// The stopping condition and other execution details depend on the executor used.
    /// See [`Execute`] and [`Executor`] for more details.
    #[instrument(skip(self, executor), fields(
        initial_time = %self.time()
    ))]
    pub fn execute<E: Execute>(&mut self, executor: E) {
        info!("Starting simulation execution");
        executor.execute(self);
        info!(
            final_time = %self.time(),
            events_processed = self.events_processed(),
            "Simulation execution completed"
        );
    }

    /// Returns the time of the next scheduled event, or None if no events are scheduled.
    pub fn peek_next_event_time(&self) -> Option<SimTime> {
        self.shared.flush_wakes();
        self.shared.scheduler.borrow().peek().map(|e| e.time())
    }

    /// Check if there are pending events
    pub fn has_pending_events(&self) -> bool {
        self.peek_next_event_time().is_some()
    }

    /// Number of processes that have not finished yet.
    pub fn task_count(&self) -> usize {
        self.runtime.task_count()
    }

    /// Number of processes that ran to completion.
    pub fn completed_tasks(&self) -> u64 {
        self.runtime.completed()
    }

    pub fn events_processed(&self) -> u64 {
        self.shared.scheduler.borrow().events_processed()
    }
}
