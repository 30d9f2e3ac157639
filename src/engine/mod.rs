//! Concurrency engine: job queue, resizable worker pool and autoscaling
//! controller.
//!
//! ```rust,ignore
//! use job_server::config::EngineConfig;
//! use job_server::engine::{task_fn, Engine, ShutdownSignal};
//!
//! let engine = Engine::start(&EngineConfig::default(), ShutdownSignal::new())?;
//! let accepted = engine.submit(task_fn(|| Ok(())));
//! engine.shutdown();
//! ```

mod controller;
mod error;
mod pool;
mod queue;
mod shutdown;
mod task;
mod worker;

pub use controller::{Controller, ScaleDecision, ScalingPolicy};
pub use error::{EngineError, PoolError, PoolResult, TaskError};
pub use pool::WorkerPool;
pub use queue::JobQueue;
pub use shutdown::ShutdownSignal;
pub use task::{task_fn, BoxedTask, Task};
pub use worker::WorkerState;

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use tracing::{info, warn};

use crate::config::{EngineConfig, QueueCapacity};
use crate::observability::Metrics;

/// A running engine.
///
/// Producers hand tasks to [`submit`](Self::submit); worker threads run
/// them; the controller thread keeps the active worker count in step with
/// the queue depth until shutdown.
pub struct Engine {
    queue: Arc<JobQueue<BoxedTask>>,
    pool: Arc<WorkerPool>,
    controller: Arc<Controller>,
    controller_handle: Mutex<Option<JoinHandle<()>>>,
    shutdown: ShutdownSignal,
    metrics: Arc<Metrics>,
    shut_down: AtomicBool,
}

impl Engine {
    /// Validate `config`, start the baseline workers and the controller.
    pub fn start(config: &EngineConfig, shutdown: ShutdownSignal) -> Result<Self, EngineError> {
        config.validate()?;

        let metrics = Arc::new(Metrics::new()?);

        let queue = Arc::new(JobQueue::with_capacity(match config.queue_capacity {
            QueueCapacity::Bounded(n) => NonZeroUsize::new(n),
            QueueCapacity::Unbounded => None,
        }));
        metrics.update_queue_metrics(0, queue.capacity());

        let pool = Arc::new(WorkerPool::new(
            config.pool_capacity,
            "worker",
            Arc::clone(&queue),
            Arc::clone(&metrics),
        ));
        pool.grow_active_workers(config.baseline_workers)?;

        let policy = ScalingPolicy {
            low_threshold: config.low_threshold,
            high_threshold: config.high_threshold,
            baseline: config.baseline_workers,
        };
        let controller = Arc::new(Controller::new(
            policy,
            config.poll_interval,
            Arc::clone(&pool),
            Arc::clone(&queue),
            shutdown.clone(),
            Arc::clone(&metrics),
        ));

        let handle = match controller.spawn() {
            Ok(handle) => handle,
            Err(e) => {
                pool.stop();
                pool.join();
                return Err(EngineError::Spawn(e));
            }
        };

        info!(
            pool_capacity = config.pool_capacity,
            queue_capacity = %config.queue_capacity,
            baseline = config.baseline_workers,
            "engine started"
        );

        Ok(Self {
            queue,
            pool,
            controller,
            controller_handle: Mutex::new(Some(handle)),
            shutdown,
            metrics,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Offer a task to the queue.
    ///
    /// Returns `false` when the queue is full or the pool has stopped; the
    /// task is dropped in that case. Stopping the pool closes the queue
    /// under its lock, so an accepted task is always either run or drained
    /// by [`shutdown`](Self::shutdown).
    pub fn submit(&self, task: BoxedTask) -> bool {
        let accepted = self.queue.enqueue(task);
        self.metrics.record_submission(accepted);
        accepted
    }

    /// Stop the controller and the pool, wait for every thread and drop
    /// whatever is still queued. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        self.shutdown.request();
        self.controller.kill();

        let handle = self
            .controller_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("controller thread panicked");
            }
        }
        // Covers a controller that died without tearing down
        self.controller.teardown();

        self.pool.join();

        // The queue is closed by now; nothing can be added after the drain
        let dropped = self.queue.drain().len();
        self.metrics.update_queue_metrics(0, self.queue.capacity());
        if dropped > 0 {
            warn!(dropped, "dropped queued jobs at shutdown");
        }

        info!("engine stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Current number of queued tasks (advisory).
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn active_workers(&self) -> usize {
        self.pool.active_workers()
    }

    pub fn pool_capacity(&self) -> usize {
        self.pool.capacity()
    }

    pub fn worker_states(&self) -> Vec<(usize, WorkerState)> {
        self.pool.worker_states()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
