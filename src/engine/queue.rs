//! Bounded FIFO job queue shared by producers and worker threads.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// A thread-safe FIFO queue with optional capacity limit.
///
/// Producers never block: [`enqueue`](Self::enqueue) rejects work once the
/// queue is full or [`close`](Self::close)d. Consumers park on a condition
/// variable until an item arrives or, for
/// [`dequeue_or_cancel`](Self::dequeue_or_cancel), until their kill flag is
/// raised and [`interrupt_waiters`](Self::interrupt_waiters) is called.
pub struct JobQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
    /// `None` means unbounded.
    capacity: Option<NonZeroUsize>,
}

struct QueueState<T> {
    items: VecDeque<T>,
    /// Set once by `close`; admission is refused from then on.
    closed: bool,
}

impl<T> JobQueue<T> {
    /// Create a queue holding at most `capacity` pending items.
    pub fn bounded(capacity: NonZeroUsize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity.get()),
                closed: false,
            }),
            available: Condvar::new(),
            capacity: Some(capacity),
        }
    }

    /// Create a queue without a capacity limit.
    pub fn unbounded() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
            capacity: None,
        }
    }

    /// Create a queue from an optional limit (`None` = unbounded).
    pub fn with_capacity(capacity: Option<NonZeroUsize>) -> Self {
        match capacity {
            Some(cap) => Self::bounded(cap),
            None => Self::unbounded(),
        }
    }

    // Nothing runs user code under this lock, so a poisoned guard still
    // holds a consistent deque.
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `item` at the tail.
    ///
    /// Returns `false` without touching the queue when it is full or closed.
    pub fn enqueue(&self, item: T) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        if let Some(cap) = self.capacity {
            if state.items.len() >= cap.get() {
                return false;
            }
        }
        state.items.push_back(item);
        drop(state);

        self.available.notify_one();
        true
    }

    /// Remove the head item, blocking until one is available.
    pub fn dequeue_blocking(&self) -> T {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return item;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Remove the head item, blocking until one is available or `cancel`
    /// is set.
    ///
    /// `cancel` is checked under the queue lock before every wait, so a
    /// caller that sets the flag and then calls [`interrupt_waiters`]
    /// always wakes the consumer. A cancelled consumer leaves pending items
    /// in place for the others.
    ///
    /// `on_take` runs under the queue lock right after an item is removed,
    /// before any other thread can observe the shorter queue.
    ///
    /// [`interrupt_waiters`]: Self::interrupt_waiters
    pub fn dequeue_or_cancel<F>(&self, cancel: &AtomicBool, on_take: F) -> Option<T>
    where
        F: FnOnce(),
    {
        let mut state = self.lock();
        loop {
            if cancel.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(item) = state.items.pop_front() {
                on_take();
                return Some(item);
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Remove the head item if there is one.
    pub fn try_dequeue(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    /// Wake every parked consumer so it re-checks its cancel flag.
    pub fn interrupt_waiters(&self) {
        // Taking the lock orders this wake after any consumer that already
        // checked its flag and is about to wait.
        let _state = self.lock();
        self.available.notify_all();
    }

    /// Refuse all further admission. Items already queued stay put.
    ///
    /// Any `enqueue` that returned `true` happened before this call, so a
    /// later [`drain`](Self::drain) sees its item.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Remove and return everything still pending, in FIFO order.
    pub fn drain(&self) -> Vec<T> {
        self.lock().items.drain(..).collect()
    }

    /// Number of pending items at this instant. Advisory only.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Configured capacity, `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity.map(NonZeroUsize::get)
    }
}
