//! Threshold autoscaling: sample queue depth, resize the pool.

use std::io;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::pool::WorkerPool;
use super::queue::JobQueue;
use super::shutdown::ShutdownSignal;
use super::task::BoxedTask;
use crate::observability::Metrics;

/// Thresholds and baseline driving scaling decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScalingPolicy {
    /// At or below this depth the pool returns to the baseline.
    pub low_threshold: usize,
    /// Shrinking is only considered while the previous depth is below this.
    pub high_threshold: usize,
    /// Active workers when the queue is calm.
    pub baseline: usize,
}

/// Outcome of one controller sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleDecision {
    ScaleTo(usize),
    NoChange,
}

impl ScalingPolicy {
    /// Decide the next active count from the current depth, the previous
    /// depth sample and the current active count.
    ///
    /// The returned target may exceed the pool capacity; the pool clamps.
    pub fn decide(&self, depth: usize, prev_depth: usize, active: usize) -> ScaleDecision {
        if depth <= self.low_threshold {
            ScaleDecision::ScaleTo(self.baseline)
        } else if depth > prev_depth {
            // An empty pool still has to start growing
            ScaleDecision::ScaleTo(active.max(1).saturating_mul(2))
        } else if depth < prev_depth && prev_depth < self.high_threshold {
            // Work is still queued, so keep at least one worker on it
            ScaleDecision::ScaleTo((active / 2).max(1))
        } else {
            ScaleDecision::NoChange
        }
    }
}

/// Periodic loop resizing a [`WorkerPool`] from the depth of its queue.
pub struct Controller {
    policy: ScalingPolicy,
    poll_interval: Duration,
    pool: Arc<WorkerPool>,
    queue: Arc<JobQueue<BoxedTask>>,
    shutdown: ShutdownSignal,
    metrics: Arc<Metrics>,
    prev_depth: Mutex<usize>,
    /// Kill flag paired with `wake` so a sleeping loop notices at once.
    killed: Mutex<bool>,
    wake: Condvar,
}

impl Controller {
    pub fn new(
        policy: ScalingPolicy,
        poll_interval: Duration,
        pool: Arc<WorkerPool>,
        queue: Arc<JobQueue<BoxedTask>>,
        shutdown: ShutdownSignal,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            policy,
            poll_interval,
            pool,
            queue,
            shutdown,
            metrics,
            prev_depth: Mutex::new(0),
            killed: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    /// Run one scaling step against `depth` and return the active count
    /// the pool reports afterwards.
    pub fn apply(&self, depth: usize) -> usize {
        let prev_depth = {
            let mut prev = self.prev_depth.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *prev, depth)
        };

        let active = self.pool.active_workers();
        self.metrics
            .update_queue_metrics(depth, self.queue.capacity());

        if let ScaleDecision::ScaleTo(target) = self.policy.decide(depth, prev_depth, active) {
            match self.pool.set_active_workers(target) {
                Ok(now) if now != active => {
                    debug!(depth, prev_depth, from = active, to = now, "pool resized");
                    self.metrics.record_scaling(active, now);
                }
                Ok(_) => {}
                Err(e) if e.is_stopped() => {}
                Err(e) => warn!(depth, target, error = %e, "failed to resize pool"),
            }
        }

        self.pool.active_workers()
    }

    /// Sample the queue once and scale.
    pub fn tick(&self) -> usize {
        self.apply(self.queue.len())
    }

    /// Loop until killed or shutdown is requested, then tear down.
    pub fn run(&self) {
        info!(
            low = self.policy.low_threshold,
            high = self.policy.high_threshold,
            baseline = self.policy.baseline,
            interval_ms = self.poll_interval.as_millis() as u64,
            "controller started"
        );

        while !self.is_killed() && !self.shutdown.is_requested() {
            self.tick();
            self.sleep();
        }

        self.teardown();
        info!("controller stopped");
    }

    /// Spawn [`run`](Self::run) on a dedicated thread.
    pub fn spawn(self: &Arc<Self>) -> io::Result<JoinHandle<()>> {
        let controller = Arc::clone(self);
        thread::Builder::new()
            .name("controller".to_string())
            .spawn(move || controller.run())
    }

    /// Ask the loop to exit and interrupt its sleep.
    pub fn kill(&self) {
        let mut killed = self.killed.lock().unwrap_or_else(PoisonError::into_inner);
        *killed = true;
        self.wake.notify_all();
    }

    pub fn is_killed(&self) -> bool {
        *self.killed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop the pool and close the shutdown signal. Safe to call repeatedly.
    pub fn teardown(&self) {
        self.pool.stop();
        self.kill();
        self.shutdown.close();
    }

    fn sleep(&self) {
        let killed = self.killed.lock().unwrap_or_else(PoisonError::into_inner);
        // Woken early or spuriously: the loop condition is re-checked either way
        let _ = self
            .wake
            .wait_timeout_while(killed, self.poll_interval, |killed| !*killed)
            .unwrap_or_else(PoisonError::into_inner);
    }
}
