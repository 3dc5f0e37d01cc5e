//! DES waker utilities.
//!
//! Wakers created here never poll anything directly. Waking pushes the task id
//! onto a shared [`WakeQueue`]; the simulation drains that queue after every
//! step and turns each entry into an event at the current time. Resource grants
//! therefore go through the same (time, sequence) ordering as timers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::task::{Wake, Waker};

use crate::types::TaskId;

/// Task ids woken since the last flush, in wake order.
#[derive(Debug, Default)]
pub struct WakeQueue {
    pending: Mutex<VecDeque<TaskId>>,
}

impl WakeQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, task: TaskId) {
        // A poisoned lock only means another waker panicked mid-push; the
        // queue contents are still valid.
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending.push_back(task);
    }

    /// Removes and returns every queued wake.
    pub fn drain(&self) -> Vec<TaskId> {
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        pending.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        match self.pending.lock() {
            Ok(guard) => guard.is_empty(),
            Err(poisoned) => poisoned.into_inner().is_empty(),
        }
    }
}

struct DesWaker {
    task: TaskId,
    queue: Arc<WakeQueue>,
}

impl Wake for DesWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.queue.push(self.task);
    }
}

/// Create a waker that queues `task` for resumption when woken.
pub fn create_des_waker(task: TaskId, queue: &Arc<WakeQueue>) -> Waker {
    Waker::from(Arc::new(DesWaker {
        task,
        queue: Arc::clone(queue),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waker_clone() {
        let queue = WakeQueue::new();
        let waker = create_des_waker(TaskId(42), &queue);

        let waker2 = waker.clone();
        let waker3 = waker2.clone();

        drop(waker);
        drop(waker3);
        drop(waker2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_waker_will_wake() {
        let queue = WakeQueue::new();
        let waker1 = create_des_waker(TaskId(1), &queue);
        let waker2 = waker1.clone();

        assert!(waker1.will_wake(&waker2));
    }

    #[test]
    fn test_wakes_are_queued_in_order() {
        let queue = WakeQueue::new();
        let a = create_des_waker(TaskId(7), &queue);
        let b = create_des_waker(TaskId(3), &queue);

        b.wake_by_ref();
        a.wake();
        b.wake();

        assert_eq!(queue.drain(), vec![TaskId(3), TaskId(7), TaskId(3)]);
        assert!(queue.is_empty());
    }
}
