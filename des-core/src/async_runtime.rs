//! DES-based async runtime.
//!
//! Simulated processes (patients, arrival streams, shift breaks) are plain Rust
//! futures. The runtime polls a process only when the scheduler pops an event
//! addressed to it, so every resumption is ordered by simulated time and then by
//! scheduling sequence.
//!
//! # Key Components
//!
//! - [`SchedulerHandle`]: cloneable handle processes use to read the clock,
//!   sleep and spawn further processes
//! - [`Timeout`]: future completing after a simulated delay
//! - [`DesRuntime`]: storage for the suspended processes
//!
//! # Basic Usage
//!
//! ```
//! use patientflow_core::{Execute, Executor, SimTime, Simulation};
//!
//! let mut sim = Simulation::default();
//! let handle = sim.scheduler_handle();
//!
//! sim.spawn(async move {
//!     handle.timeout(100.0).unwrap().await;
//!     handle.timeout(50.0).unwrap().await;
//!     assert_eq!(handle.now(), SimTime::new(150.0).unwrap());
//! });
//!
//! Executor::unbound().execute(&mut sim);
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use tracing::{debug, instrument, trace};

use crate::error::SimError;
use crate::scheduler::{ClockRef, Scheduler};
use crate::time::SimTime;
use crate::types::TaskId;
use crate::waker::{create_des_waker, WakeQueue};

type LocalFuture = Pin<Box<dyn Future<Output = ()>>>;

/// State shared between the simulation driver and every handle.
pub(crate) struct RuntimeShared {
    pub(crate) scheduler: RefCell<Scheduler>,
    spawned: RefCell<Vec<(TaskId, LocalFuture)>>,
    next_task_id: Cell<u64>,
    current_task: Cell<Option<TaskId>>,
    pub(crate) wakes: Arc<WakeQueue>,
}

impl RuntimeShared {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            scheduler: RefCell::new(Scheduler::default()),
            spawned: RefCell::new(Vec::new()),
            next_task_id: Cell::new(0),
            current_task: Cell::new(None),
            wakes: WakeQueue::new(),
        })
    }

    fn spawn(&self, future: LocalFuture) -> TaskId {
        let task_id = TaskId(self.next_task_id.get());
        self.next_task_id.set(task_id.0 + 1);
        self.spawned.borrow_mut().push((task_id, future));
        self.scheduler.borrow_mut().schedule_now(task_id);
        task_id
    }

    /// Turns queued wakes into events at the current time.
    pub(crate) fn flush_wakes(&self) {
        let woken = self.wakes.drain();
        if woken.is_empty() {
            return;
        }
        let mut scheduler = self.scheduler.borrow_mut();
        for task in woken {
            trace!(%task, "Task woken");
            scheduler.schedule_now(task);
        }
    }

    fn now(&self) -> SimTime {
        self.scheduler.borrow().time()
    }
}

/// Cloneable handle giving processes access to the simulation.
///
/// Handles are `!Send`: every process of a simulation runs on the thread that
/// owns the [`Simulation`](crate::Simulation).
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Rc<RuntimeShared>,
}

impl SchedulerHandle {
    pub(crate) fn new(shared: Rc<RuntimeShared>) -> Self {
        Self { shared }
    }

    /// Current simulation time.
    pub fn now(&self) -> SimTime {
        self.shared.now()
    }

    /// Read-only view of the simulation clock.
    pub fn clock(&self) -> ClockRef {
        self.shared.scheduler.borrow().clock()
    }

    /// Returns a future that completes `duration` time units from now.
    ///
    /// Negative or non-finite durations are rejected before anything is
    /// scheduled. A zero duration still yields to every other process due at
    /// the current instant.
    pub fn timeout(&self, duration: f64) -> Result<Timeout, SimError> {
        let target = self.now().checked_add(duration)?;
        Ok(Timeout::new(Rc::clone(&self.shared), target))
    }

    /// Returns a future that completes at the absolute time `time`.
    pub fn timeout_until(&self, time: SimTime) -> Result<Timeout, SimError> {
        if time < self.now() {
            return Err(SimError::InvalidTime {
                value: time.as_f64(),
            });
        }
        Ok(Timeout::new(Rc::clone(&self.shared), time))
    }

    /// Starts a new process at the current time.
    ///
    /// The process is first polled after every event already queued for this
    /// instant.
    pub fn spawn<F>(&self, future: F) -> TaskId
    where
        F: Future<Output = ()> + 'static,
    {
        let task_id = self.shared.spawn(Box::pin(future));
        debug!(%task_id, time = %self.now(), "Spawned process");
        task_id
    }

    /// Id of the process currently being polled, if any.
    pub fn current_task(&self) -> Option<TaskId> {
        self.shared.current_task.get()
    }
}

/// A future that completes at a fixed simulated time.
///
/// Created by [`SchedulerHandle::timeout`] and [`SchedulerHandle::timeout_until`].
/// The target time is fixed when the timeout is created.
pub struct Timeout {
    shared: Rc<RuntimeShared>,
    target: SimTime,
    scheduled: bool,
}

impl Timeout {
    fn new(shared: Rc<RuntimeShared>, target: SimTime) -> Self {
        Self {
            shared,
            target,
            scheduled: false,
        }
    }

    /// Time at which this timeout completes.
    pub fn target(&self) -> SimTime {
        self.target
    }
}

impl Future for Timeout {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let now = self.shared.now();

        if self.scheduled {
            return if now >= self.target {
                Poll::Ready(())
            } else {
                Poll::Pending
            };
        }

        if now > self.target {
            return Poll::Ready(());
        }

        let Some(task) = self.shared.current_task.get() else {
            panic!("Timeout polled outside of the simulation runtime; await it inside a process spawned on a Simulation");
        };

        let target = self.target;
        // target >= now, so scheduling cannot fail
        if let Err(error) = self.shared.scheduler.borrow_mut().schedule_at(target, task) {
            debug!(%error, "Timeout could not be scheduled");
            return Poll::Ready(());
        }
        self.scheduled = true;
        trace!(%task, %target, "Timeout scheduled");
        Poll::Pending
    }
}

/// A suspended process.
struct Task {
    future: LocalFuture,
}

/// Storage for the processes of one simulation.
///
/// The runtime holds the futures; the scheduler decides when each one is polled.
#[derive(Default)]
pub struct DesRuntime {
    tasks: HashMap<TaskId, Task>,
    completed: u64,
}

impl DesRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live processes.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn has_tasks(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Number of processes that ran to completion.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Takes ownership of processes spawned since the last call.
    pub(crate) fn adopt_spawned(&mut self, shared: &RuntimeShared) {
        let spawned: Vec<_> = shared.spawned.borrow_mut().drain(..).collect();
        for (task_id, future) in spawned {
            self.tasks.insert(task_id, Task { future });
        }
    }

    /// Polls a single process. Returns `None` if the process already finished.
    #[instrument(level = "trace", skip(self, shared), fields(task_id = %task_id))]
    pub(crate) fn poll_task(&mut self, task_id: TaskId, shared: &RuntimeShared) -> Option<Poll<()>> {
        let task = self.tasks.get_mut(&task_id)?;

        let waker = create_des_waker(task_id, &shared.wakes);
        let mut cx = Context::from_waker(&waker);

        shared.current_task.set(Some(task_id));
        trace!("Polling process");
        let result = task.future.as_mut().poll(&mut cx);
        shared.current_task.set(None);

        if result.is_ready() {
            self.tasks.remove(&task_id);
            self.completed += 1;
            debug!(remaining = self.tasks.len(), "Process completed");
        }

        Some(result)
    }
}
