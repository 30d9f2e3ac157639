//! Worker thread: pull a task, run it, repeat until killed.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, warn};

use super::queue::JobQueue;
use super::task::BoxedTask;
use crate::observability::{ExecutionStatus, Metrics};

/// Observable worker state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting on the queue (or about to).
    Idle,
    /// Running a task.
    Executing,
    /// Loop exited; the thread is finishing or gone.
    Dead,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Idle,
            1 => WorkerState::Executing,
            _ => WorkerState::Dead,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WorkerState::Idle => 0,
            WorkerState::Executing => 1,
            WorkerState::Dead => 2,
        }
    }
}

/// State shared between a worker thread and the pool.
///
/// The kill flag is written by the pool and read by the worker; the state
/// is written by the worker and read by the pool.
struct Shared {
    killed: AtomicBool,
    state: AtomicU8,
}

impl Shared {
    fn set_state(&self, state: WorkerState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }
}

/// Handle to a running worker thread.
pub(crate) struct Worker {
    id: usize,
    shared: Arc<Shared>,
    queue: Arc<JobQueue<BoxedTask>>,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Spawn a worker bound to `queue`.
    pub(crate) fn spawn(
        id: usize,
        pool_name: &str,
        queue: Arc<JobQueue<BoxedTask>>,
        metrics: Arc<Metrics>,
    ) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            killed: AtomicBool::new(false),
            state: AtomicU8::new(WorkerState::Idle.as_u8()),
        });

        let handle = {
            let shared = Arc::clone(&shared);
            let queue = Arc::clone(&queue);
            thread::Builder::new()
                .name(format!("{}-{}", pool_name, id))
                .spawn(move || worker_loop(id, &shared, &queue, &metrics))?
        };

        Ok(Self {
            id,
            shared,
            queue,
            handle,
        })
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    /// Ask the worker to exit.
    ///
    /// Sets the kill flag and wakes the queue's waiters, so a worker parked
    /// in the queue notices right away. A worker that is executing finishes
    /// its current task first.
    pub(crate) fn kill(&self) {
        self.shared.killed.store(true, Ordering::SeqCst);
        self.queue.interrupt_waiters();
    }

    /// Wait for the thread to exit.
    pub(crate) fn join(self) {
        if self.handle.join().is_err() {
            warn!(worker = self.id, "worker thread panicked");
        }
    }
}

fn worker_loop(id: usize, shared: &Shared, queue: &JobQueue<BoxedTask>, metrics: &Metrics) {
    debug!(worker = id, "worker started");

    while !shared.killed.load(Ordering::SeqCst) {
        shared.set_state(WorkerState::Idle);

        // Published under the queue lock, so shrink never sees a worker
        // holding a task as idle
        let taken = queue.dequeue_or_cancel(&shared.killed, || {
            shared.set_state(WorkerState::Executing);
        });
        let Some(task) = taken else {
            break;
        };

        run_task(id, task, metrics);
    }

    shared.set_state(WorkerState::Dead);
    debug!(worker = id, "worker stopped");
}

/// Run one task, keeping errors and panics inside this call.
fn run_task(id: usize, task: BoxedTask, metrics: &Metrics) {
    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(move || task.execute()));
    let elapsed = started.elapsed().as_secs_f64();

    let status = match result {
        Ok(Ok(())) => ExecutionStatus::Ok,
        Ok(Err(e)) => {
            warn!(worker = id, error = %e, "task failed");
            ExecutionStatus::Error
        }
        Err(payload) => {
            warn!(worker = id, panic = %panic_message(&*payload), "task panicked");
            ExecutionStatus::Panic
        }
    };

    metrics.record_execution(status, elapsed);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
