//! Level-based pool of a continuous quantity, such as nursing minutes.
//!
//! `get` waits until enough is available and `put` waits until there is room.
//! Each queue is served strictly in arrival order: a large request at the head
//! blocks smaller ones behind it.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use tracing::trace;

use crate::error::SimError;

#[derive(Debug)]
struct Waiter {
    id: u64,
    amount: f64,
    waker: Waker,
}

#[derive(Debug)]
struct State {
    name: String,
    capacity: f64,
    level: f64,
    next_id: u64,
    getters: VecDeque<Waiter>,
    putters: VecDeque<Waiter>,
    // Waiters served but not yet resumed.
    done: HashSet<u64>,
}

impl State {
    /// Serves queue heads until neither queue can progress.
    fn settle(&mut self) -> Vec<Waker> {
        let mut to_wake = Vec::new();
        loop {
            let mut progressed = false;

            while let Some(front) = self.getters.front() {
                if front.amount > self.level {
                    break;
                }
                let Some(waiter) = self.getters.pop_front() else {
                    break;
                };
                self.level -= waiter.amount;
                self.done.insert(waiter.id);
                to_wake.push(waiter.waker);
                progressed = true;
            }

            while let Some(front) = self.putters.front() {
                if self.level + front.amount > self.capacity {
                    break;
                }
                let Some(waiter) = self.putters.pop_front() else {
                    break;
                };
                self.level += waiter.amount;
                self.done.insert(waiter.id);
                to_wake.push(waiter.waker);
                progressed = true;
            }

            if !progressed {
                break;
            }
        }
        to_wake
    }

    fn check_amount(&self, amount: f64) -> Result<(), SimError> {
        let reason = if !amount.is_finite() || amount <= 0.0 {
            "amount must be positive and finite"
        } else if amount > self.capacity {
            "amount exceeds container capacity"
        } else {
            return Ok(());
        };
        Err(SimError::InvalidAmount {
            name: self.name.clone(),
            amount,
            reason: reason.to_string(),
        })
    }
}

fn wake_all(wakers: Vec<Waker>) {
    for waker in wakers {
        waker.wake();
    }
}

/// A shared level of continuous quantity between zero and a fixed capacity.
///
/// Cloning yields another handle to the same container.
#[derive(Clone)]
pub struct Container {
    state: Rc<RefCell<State>>,
}

impl Container {
    pub fn new(name: impl Into<String>, capacity: f64, init: f64) -> Result<Self, SimError> {
        let name = name.into();
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(SimError::ResourceConfiguration {
                name,
                reason: format!("capacity must be positive and finite, got {capacity}"),
            });
        }
        if !init.is_finite() || init < 0.0 || init > capacity {
            return Err(SimError::ResourceConfiguration {
                name,
                reason: format!("initial level {init} outside [0, {capacity}]"),
            });
        }
        Ok(Self {
            state: Rc::new(RefCell::new(State {
                name,
                capacity,
                level: init,
                next_id: 0,
                getters: VecDeque::new(),
                putters: VecDeque::new(),
                done: HashSet::new(),
            })),
        })
    }

    /// Takes `amount` out of the container, waiting until it is available.
    pub fn get(&self, amount: f64) -> ContainerGet {
        ContainerGet {
            op: Op::new(Rc::clone(&self.state), amount, Kind::Get),
        }
    }

    /// Puts `amount` into the container, waiting until there is room.
    pub fn put(&self, amount: f64) -> ContainerPut {
        ContainerPut {
            op: Op::new(Rc::clone(&self.state), amount, Kind::Put),
        }
    }

    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    pub fn capacity(&self) -> f64 {
        self.state.borrow().capacity
    }

    /// Current level.
    pub fn level(&self) -> f64 {
        self.state.borrow().level
    }

    pub fn get_queue_len(&self) -> usize {
        self.state.borrow().getters.len()
    }

    pub fn put_queue_len(&self) -> usize {
        self.state.borrow().putters.len()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Container")
            .field("name", &state.name)
            .field("capacity", &state.capacity)
            .field("level", &state.level)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Get,
    Put,
}

struct Op {
    state: Rc<RefCell<State>>,
    amount: f64,
    kind: Kind,
    waiter_id: Option<u64>,
    completed: bool,
}

impl Op {
    fn new(state: Rc<RefCell<State>>, amount: f64, kind: Kind) -> Self {
        Self {
            state,
            amount,
            kind,
            waiter_id: None,
            completed: false,
        }
    }

    fn poll_op(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), SimError>> {
        if self.completed {
            return Poll::Ready(Ok(()));
        }

        let state_rc = Rc::clone(&self.state);
        let mut state = state_rc.borrow_mut();

        if let Some(id) = self.waiter_id {
            if state.done.remove(&id) {
                self.waiter_id = None;
                self.completed = true;
                return Poll::Ready(Ok(()));
            }
            let queue = match self.kind {
                Kind::Get => &mut state.getters,
                Kind::Put => &mut state.putters,
            };
            if let Some(waiter) = queue.iter_mut().find(|w| w.id == id) {
                waiter.waker.clone_from(cx.waker());
            }
            return Poll::Pending;
        }

        if let Err(error) = state.check_amount(self.amount) {
            self.completed = true;
            return Poll::Ready(Err(error));
        }

        let id = state.next_id;
        state.next_id += 1;
        let waiter = Waiter {
            id,
            amount: self.amount,
            waker: cx.waker().clone(),
        };
        match self.kind {
            Kind::Get => state.getters.push_back(waiter),
            Kind::Put => state.putters.push_back(waiter),
        }

        let to_wake = state.settle();
        if state.done.remove(&id) {
            trace!(container = %state.name, kind = ?self.kind, amount = self.amount, level = state.level, "Served immediately");
            drop(state);
            wake_all(to_wake.into_iter().filter(|w| !w.will_wake(cx.waker())).collect());
            self.completed = true;
            return Poll::Ready(Ok(()));
        }

        trace!(
            container = %state.name,
            kind = ?self.kind,
            amount = self.amount,
            level = state.level,
            "Waiting on container"
        );
        drop(state);
        wake_all(to_wake);
        self.waiter_id = Some(id);
        Poll::Pending
    }
}

impl Drop for Op {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let Some(id) = self.waiter_id.take() else {
            return;
        };

        let wakers = {
            let mut state = self.state.borrow_mut();
            if state.done.remove(&id) {
                // Served but never resumed: undo a get so the quantity is not lost.
                if self.kind == Kind::Get {
                    state.level += self.amount;
                } else {
                    return;
                }
            } else {
                match self.kind {
                    Kind::Get => state.getters.retain(|w| w.id != id),
                    Kind::Put => state.putters.retain(|w| w.id != id),
                }
            }
            state.settle()
        };
        wake_all(wakers);
    }
}

/// Future returned by [`Container::get`].
pub struct ContainerGet {
    op: Op,
}

impl Future for ContainerGet {
    type Output = Result<(), SimError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.op.poll_op(cx)
    }
}

/// Future returned by [`Container::put`].
pub struct ContainerPut {
    op: Op,
}

impl Future for ContainerPut {
    type Output = Result<(), SimError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.op.poll_op(cx)
    }
}
