//! Finite-capacity resources processes queue for.
//!
//! A [`Resource`] serves waiting requests first-come first-served. A
//! [`PriorityResource`] serves the lowest priority value first and falls back to
//! arrival order between equal priorities. Both hand out [`Lease`]s that return
//! their unit when released or dropped.
//!
//! Capacity freed by a release goes straight to the best pending request, so a
//! request arriving while others wait can never overtake them.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::SimError;
use crate::scheduler::ClockRef;
use crate::time::SimTime;

/// Priority used by [`Resource::request`].
pub const DEFAULT_PRIORITY: i64 = 0;

/// Cumulative counters for one resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceStats {
    /// Requests made, granted or not.
    pub requests: u64,
    /// Requests that obtained a unit.
    pub grants: u64,
    pub releases: u64,
    /// Longest queue observed.
    pub max_queue_len: usize,
    /// Integral of units in use over time. Only tracked when a clock is attached.
    pub busy_time: f64,
}

impl ResourceStats {
    /// Fraction of available capacity used over `elapsed` time units.
    pub fn utilization(&self, capacity: usize, elapsed: f64) -> Option<f64> {
        if capacity == 0 || elapsed <= 0.0 {
            return None;
        }
        Some(self.busy_time / (capacity as f64 * elapsed))
    }
}

#[derive(Debug)]
struct State {
    name: String,
    capacity: usize,
    in_use: usize,
    next_request_id: u64,

    // Pending requests keyed by (priority, arrival).
    queue: BTreeMap<(i64, u64), Waker>,

    // Requests already holding a unit whose futures have not yet observed it.
    ready: HashSet<u64>,

    stats: ResourceStats,
    clock: Option<ClockRef>,
    last_change: SimTime,
}

impl State {
    fn accumulate_busy_time(&mut self) {
        if let Some(clock) = &self.clock {
            let now = clock.time();
            self.stats.busy_time += self.in_use as f64 * (now - self.last_change);
            self.last_change = now;
        }
    }

    fn acquire_unit(&mut self) {
        self.accumulate_busy_time();
        self.in_use += 1;
        self.stats.grants += 1;
    }

    /// Frees one unit and hands it to the best pending request, if any.
    fn release_unit(&mut self) -> Option<Waker> {
        self.accumulate_busy_time();
        self.in_use = self.in_use.saturating_sub(1);
        self.stats.releases += 1;

        let ((priority, request_id), waker) = self.queue.pop_first()?;
        self.in_use += 1;
        self.stats.grants += 1;
        self.ready.insert(request_id);
        debug!(
            resource = %self.name,
            request_id,
            priority,
            in_use = self.in_use,
            queue_len = self.queue.len(),
            "Unit transferred to waiting request"
        );
        Some(waker)
    }
}

type Core = Rc<RefCell<State>>;

fn new_core(name: &str, capacity: usize) -> Result<Core, SimError> {
    if capacity == 0 {
        return Err(SimError::ResourceConfiguration {
            name: name.to_string(),
            reason: "capacity must be at least 1".to_string(),
        });
    }
    Ok(Rc::new(RefCell::new(State {
        name: name.to_string(),
        capacity,
        in_use: 0,
        next_request_id: 0,
        queue: BTreeMap::new(),
        ready: HashSet::new(),
        stats: ResourceStats::default(),
        clock: None,
        last_change: SimTime::zero(),
    })))
}

fn attach_clock(core: &Core, clock: ClockRef) {
    let mut state = core.borrow_mut();
    state.last_change = clock.time();
    state.clock = Some(clock);
}

fn release_lease(core: &Core) {
    let waker = core.borrow_mut().release_unit();
    if let Some(waker) = waker {
        waker.wake();
    }
}

fn snapshot_stats(core: &Core) -> ResourceStats {
    let mut state = core.borrow_mut();
    state.accumulate_busy_time();
    state.stats.clone()
}

fn check_owner(core: &Core, lease: Lease) -> Result<(), SimError> {
    if Rc::ptr_eq(core, &lease.core) {
        lease.release();
        Ok(())
    } else {
        let name = core.borrow().name.clone();
        warn!(resource = %name, "Lease released to the wrong resource");
        // The lease still returns its unit to the resource it came from.
        drop(lease);
        Err(SimError::ForeignLease { name })
    }
}

macro_rules! resource_accessors {
    () => {
        /// Name given at construction.
        pub fn name(&self) -> String {
            self.core.borrow().name.clone()
        }

        /// Fixed number of units.
        pub fn capacity(&self) -> usize {
            self.core.borrow().capacity
        }

        /// Units currently held, including units granted to requests that have
        /// not resumed yet.
        pub fn in_use(&self) -> usize {
            self.core.borrow().in_use
        }

        /// Number of requests waiting for a unit.
        pub fn queue_len(&self) -> usize {
            self.core.borrow().queue.len()
        }

        /// Counters so far, with busy time brought up to the current time.
        pub fn stats(&self) -> ResourceStats {
            snapshot_stats(&self.core)
        }

        /// Enables busy-time tracking against `clock`.
        #[must_use]
        pub fn with_clock(self, clock: ClockRef) -> Self {
            attach_clock(&self.core, clock);
            self
        }

        /// Returns `lease` to this resource.
        ///
        /// Fails if the lease was obtained from a different resource; that lease
        /// is still returned to its own resource.
        pub fn release(&self, lease: Lease) -> Result<(), SimError> {
            check_owner(&self.core, lease)
        }
    };
}

/// A pool of identical servers granted in arrival order.
///
/// Cloning yields another handle to the same pool.
#[derive(Clone)]
pub struct Resource {
    core: Core,
}

impl Resource {
    /// Creates a pool with `capacity` units. Zero capacity is rejected.
    pub fn new(name: impl Into<String>, capacity: usize) -> Result<Self, SimError> {
        let name = name.into();
        Ok(Self {
            core: new_core(&name, capacity)?,
        })
    }

    /// Waits for a unit.
    pub fn request(&self) -> Request {
        Request::new(Rc::clone(&self.core), DEFAULT_PRIORITY)
    }

    resource_accessors!();
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.borrow();
        f.debug_struct("Resource")
            .field("name", &state.name)
            .field("capacity", &state.capacity)
            .field("in_use", &state.in_use)
            .field("queue_len", &state.queue.len())
            .finish()
    }
}

/// A pool of identical servers granted by priority.
///
/// Lower values are served first; equal priorities are served in arrival order.
/// A waiting request is never preempted by one that arrives later, and a unit
/// already granted is never taken back.
#[derive(Clone)]
pub struct PriorityResource {
    core: Core,
}

impl PriorityResource {
    /// Creates a pool with `capacity` units. Zero capacity is rejected.
    pub fn new(name: impl Into<String>, capacity: usize) -> Result<Self, SimError> {
        let name = name.into();
        Ok(Self {
            core: new_core(&name, capacity)?,
        })
    }

    /// Waits for a unit at `priority`.
    pub fn request(&self, priority: i64) -> Request {
        Request::new(Rc::clone(&self.core), priority)
    }

    resource_accessors!();
}

impl fmt::Debug for PriorityResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.borrow();
        f.debug_struct("PriorityResource")
            .field("name", &state.name)
            .field("capacity", &state.capacity)
            .field("in_use", &state.in_use)
            .field("queue_len", &state.queue.len())
            .finish()
    }
}

/// Future returned by `request`, resolving to a [`Lease`].
///
/// Dropping a pending request withdraws it from the queue. Dropping a request
/// that was granted but never resumed returns the unit.
pub struct Request {
    core: Core,
    priority: i64,
    request_id: Option<u64>,
    completed: bool,
}

impl Request {
    fn new(core: Core, priority: i64) -> Self {
        Self {
            core,
            priority,
            request_id: None,
            completed: false,
        }
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    fn grant(&mut self) -> Lease {
        self.completed = true;
        self.request_id = None;
        Lease {
            core: Rc::clone(&self.core),
            priority: self.priority,
            released: false,
        }
    }
}

impl Future for Request {
    type Output = Lease;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Lease> {
        if self.completed {
            panic!("resource request polled after it was granted");
        }

        let core = Rc::clone(&self.core);
        let mut state = core.borrow_mut();

        if let Some(request_id) = self.request_id {
            if state.ready.remove(&request_id) {
                drop(state);
                return Poll::Ready(self.grant());
            }

            if let Some(waker) = state.queue.get_mut(&(self.priority, request_id)) {
                waker.clone_from(cx.waker());
            } else {
                warn!(resource = %state.name, request_id, "Request neither queued nor granted");
            }
            return Poll::Pending;
        }

        state.stats.requests += 1;

        if state.queue.is_empty() && state.in_use < state.capacity {
            state.acquire_unit();
            trace!(
                resource = %state.name,
                priority = self.priority,
                in_use = state.in_use,
                "Request granted immediately"
            );
            drop(state);
            return Poll::Ready(self.grant());
        }

        let request_id = state.next_request_id;
        state.next_request_id += 1;
        state
            .queue
            .insert((self.priority, request_id), cx.waker().clone());
        state.stats.max_queue_len = state.stats.max_queue_len.max(state.queue.len());
        trace!(
            resource = %state.name,
            request_id,
            priority = self.priority,
            queue_len = state.queue.len(),
            "Request queued"
        );
        self.request_id = Some(request_id);
        Poll::Pending
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let Some(request_id) = self.request_id.take() else {
            return;
        };

        let waker = {
            let mut state = self.core.borrow_mut();
            if state.ready.remove(&request_id) {
                state.release_unit()
            } else {
                state.queue.remove(&(self.priority, request_id));
                None
            }
        };

        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// One unit of a resource, held until released or dropped.
#[must_use = "dropping a lease releases the unit immediately"]
pub struct Lease {
    core: Core,
    priority: i64,
    released: bool,
}

impl Lease {
    /// Priority the unit was requested at.
    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn resource_name(&self) -> String {
        self.core.borrow().name.clone()
    }

    /// Returns the unit to its resource.
    pub fn release(mut self) {
        self.released = true;
        release_lease(&self.core);
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            release_lease(&self.core);
        }
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("resource", &self.core.borrow().name)
            .field("priority", &self.priority)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskId;
    use crate::waker::{create_des_waker, WakeQueue};
    use crate::{Execute, Executor, Simulation};
    use std::cell::RefCell;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            Resource::new("doctor", 0),
            Err(SimError::ResourceConfiguration { .. })
        ));
        assert!(PriorityResource::new("doctor", 0).is_err());
    }

    #[test]
    fn test_fifo_service_order() {
        let mut sim = Simulation::default();
        let resource = Resource::new("nurse", 1).unwrap();
        let order = Rc::new(RefCell::new(Vec::new()));

        for id in 0..4 {
            let handle = sim.scheduler_handle();
            let resource = resource.clone();
            let order = order.clone();
            sim.spawn(async move {
                let lease = resource.request().await;
                order.borrow_mut().push((id, handle.now().as_f64()));
                handle.timeout(5.0).unwrap().await;
                drop(lease);
            });
        }

        Executor::unbound().execute(&mut sim);
        assert_eq!(
            *order.borrow(),
            vec![(0, 0.0), (1, 5.0), (2, 10.0), (3, 15.0)]
        );
        assert_eq!(resource.in_use(), 0);
        assert_eq!(resource.queue_len(), 0);
        let stats = resource.stats();
        assert_eq!(stats.requests, 4);
        assert_eq!(stats.grants, 4);
        assert_eq!(stats.releases, 4);
        assert_eq!(stats.max_queue_len, 3);
    }

    #[test]
    fn test_priority_grant_order() {
        let mut sim = Simulation::default();
        let doctor = PriorityResource::new("doctor", 1).unwrap();
        let order = Rc::new(RefCell::new(Vec::new()));

        // Occupy the doctor so the next three requests queue up.
        {
            let handle = sim.scheduler_handle();
            let doctor = doctor.clone();
            sim.spawn(async move {
                let _lease = doctor.request(0).await;
                handle.timeout(10.0).unwrap().await;
            });
        }

        for priority in [3, 1, 2] {
            let handle = sim.scheduler_handle();
            let doctor = doctor.clone();
            let order = order.clone();
            sim.spawn(async move {
                handle.timeout(1.0).unwrap().await;
                let lease = doctor.request(priority).await;
                order.borrow_mut().push(priority);
                handle.timeout(1.0).unwrap().await;
                lease.release();
            });
        }

        Executor::unbound().execute(&mut sim);
        assert_eq!(*order.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_equal_priority_is_fifo() {
        let mut sim = Simulation::default();
        let doctor = PriorityResource::new("doctor", 1).unwrap();
        let order = Rc::new(RefCell::new(Vec::new()));

        for id in 0..5 {
            let handle = sim.scheduler_handle();
            let doctor = doctor.clone();
            let order = order.clone();
            sim.spawn(async move {
                let priority = if id == 0 { 0 } else { 2 };
                let _lease = doctor.request(priority).await;
                order.borrow_mut().push(id);
                handle.timeout(1.0).unwrap().await;
            });
        }

        Executor::unbound().execute(&mut sim);
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_dropping_pending_request_leaves_queue() {
        let mut sim = Simulation::default();
        let resource = Resource::new("room", 1).unwrap();
        let handle = sim.scheduler_handle();
        let held = resource.clone();
        let observed = Rc::new(RefCell::new(Vec::new()));
        let observed_clone = observed.clone();

        sim.spawn(async move {
            let lease = held.request().await;
            // Poll a second request once so it queues, then give up on it.
            let mut pending = Box::pin(held.request());
            let waker = create_des_waker(TaskId(u64::MAX), &WakeQueue::new());
            let mut cx = Context::from_waker(&waker);
            assert!(pending.as_mut().poll(&mut cx).is_pending());
            observed_clone.borrow_mut().push(held.queue_len());
            drop(pending);
            observed_clone.borrow_mut().push(held.queue_len());
            handle.timeout(1.0).unwrap().await;
            drop(lease);
            observed_clone.borrow_mut().push(held.in_use());
        });

        Executor::unbound().execute(&mut sim);
        assert_eq!(*observed.borrow(), vec![1, 0, 0]);
    }

    #[test]
    fn test_foreign_lease_rejected() {
        let mut sim = Simulation::default();
        let a = Resource::new("a", 1).unwrap();
        let b = Resource::new("b", 1).unwrap();
        let result = Rc::new(RefCell::new(None));
        let result_clone = result.clone();
        let (a2, b2) = (a.clone(), b.clone());

        sim.spawn(async move {
            let lease = a2.request().await;
            *result_clone.borrow_mut() = Some(b2.release(lease));
        });

        Executor::unbound().execute(&mut sim);
        assert!(matches!(
            result.borrow().as_ref(),
            Some(Err(SimError::ForeignLease { .. }))
        ));
        assert_eq!(a.in_use(), 0);
        assert_eq!(b.in_use(), 0);
    }

    #[test]
    fn test_busy_time_with_clock() {
        let mut sim = Simulation::default();
        let resource = Resource::new("gp", 2).unwrap().with_clock(sim.clock());

        for hold in [4.0, 8.0] {
            let handle = sim.scheduler_handle();
            let resource = resource.clone();
            sim.spawn(async move {
                let _lease = resource.request().await;
                handle.timeout(hold).unwrap().await;
            });
        }

        Executor::unbound().execute(&mut sim);
        let stats = resource.stats();
        assert_eq!(stats.busy_time, 12.0);
        assert_eq!(stats.utilization(2, 8.0), Some(0.75));
        assert_eq!(stats.utilization(2, 0.0), None);
    }
}
