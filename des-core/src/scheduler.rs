use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;

use tracing::trace;

use crate::error::SimError;
use crate::time::{validate_duration, SimTime};
use crate::types::{EventId, TaskId};

/// Entry stored in the scheduler: the process to resume and when.
///
/// Entries are ordered by time, then by the sequence number assigned when they
/// were scheduled, so same-time resumptions come out first-in first-out.
#[derive(Debug, Clone, Copy)]
pub struct EventEntry {
    id: EventId,
    time: SimTime,
    task: TaskId,
}

impl EventEntry {
    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn time(&self) -> SimTime {
        self.time
    }

    pub fn task(&self) -> TaskId {
        self.task
    }
}

impl PartialEq for EventEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventEntry {}

impl PartialOrd for EventEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse the ordering for min-heap behavior in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

type Clock = Rc<Cell<SimTime>>;

/// This struct exposes only immutable access to the simulation clock.
/// The clock itself is owned by the scheduler, while others can obtain `ClockRef`
/// to read the current simulation time.
///
/// # Example
///
/// ```
/// # use patientflow_core::Scheduler;
/// let scheduler = Scheduler::default();
/// let clock_ref = scheduler.clock();
/// assert_eq!(clock_ref.time(), scheduler.time());
/// ```
#[derive(Debug, Clone)]
pub struct ClockRef {
    clock: Clock,
}

impl From<Clock> for ClockRef {
    fn from(clock: Clock) -> Self {
        Self { clock }
    }
}

impl ClockRef {
    /// Return the current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.clock.get()
    }
}

/// Scheduler is used to keep the current time and information about the upcoming events.
///
/// See the [crate-level documentation](index.html) for more information.
pub struct Scheduler {
    next_event_id: u64,
    events: BinaryHeap<EventEntry>,
    clock: Clock,
    events_processed: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            next_event_id: 0,
            events: BinaryHeap::default(),
            clock: Rc::new(Cell::new(SimTime::default())),
            events_processed: 0,
        }
    }
}

impl Scheduler {
    /// Schedules `task` to be resumed at `self.time() + delay`.
    pub fn schedule(&mut self, delay: f64, task: TaskId) -> Result<EventId, SimError> {
        validate_duration(delay)?;
        let time = self.time().checked_add(delay)?;
        Ok(self.push(time, task))
    }

    /// Schedules `task` to be resumed at the absolute time `time`.
    ///
    /// Times in the past are rejected; the clock never runs backwards.
    pub fn schedule_at(&mut self, time: SimTime, task: TaskId) -> Result<EventId, SimError> {
        if time < self.time() {
            return Err(SimError::InvalidTime {
                value: time.as_f64(),
            });
        }
        Ok(self.push(time, task))
    }

    /// Schedules `task` to be resumed at `self.time()`, behind anything
    /// already queued for this instant.
    pub fn schedule_now(&mut self, task: TaskId) -> EventId {
        let now = self.time();
        self.push(now, task)
    }

    fn push(&mut self, time: SimTime, task: TaskId) -> EventId {
        self.next_event_id += 1;
        let id = EventId(self.next_event_id);
        trace!(event_id = %id, %task, %time, "Event scheduled");
        self.events.push(EventEntry { id, time, task });
        id
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.clock.get()
    }

    /// Returns a structure with immutable access to the simulation time.
    #[must_use]
    pub fn clock(&self) -> ClockRef {
        ClockRef {
            clock: Rc::clone(&self.clock),
        }
    }

    /// Returns a reference to the next scheduled event or `None` if none are left.
    pub fn peek(&self) -> Option<&EventEntry> {
        self.events.peek()
    }

    /// Removes and returns the next scheduled event or `None` if none are left.
    ///
    /// The clock is advanced to the time of the returned event.
    pub fn pop(&mut self) -> Option<EventEntry> {
        self.events.pop().inspect(|event| {
            self.clock.replace(event.time());
            self.events_processed += 1;
        })
    }

    /// Number of events waiting in the queue.
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    /// Number of events popped so far.
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }
}
