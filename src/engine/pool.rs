//! Resizable worker pool over a fixed array of slots.

use std::mem;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use super::error::{PoolError, PoolResult};
use super::queue::JobQueue;
use super::task::BoxedTask;
use super::worker::{Worker, WorkerState};
use crate::observability::Metrics;

/// A pool of worker threads whose active count can change at runtime.
///
/// The pool owns `capacity` slots. Growing fills free slots in index
/// order; shrinking empties slots, preferring idle workers. Every
/// mutating call holds the same lock, so resizes never interleave.
pub struct WorkerPool {
    name: String,
    capacity: usize,
    queue: Arc<JobQueue<BoxedTask>>,
    metrics: Arc<Metrics>,
    inner: Mutex<PoolInner>,
    /// Signalled once when the pool is stopped.
    stopped_cv: Condvar,
}

struct PoolInner {
    slots: Vec<Option<Worker>>,
    active: usize,
    stopped: bool,
    /// Workers killed by `stop` that `join` still has to wait for.
    retired: Vec<Worker>,
}

impl WorkerPool {
    /// Create an empty pool with `capacity` slots.
    pub fn new(
        capacity: usize,
        name: impl Into<String>,
        queue: Arc<JobQueue<BoxedTask>>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let name = name.into();
        metrics.update_worker_metrics(0, capacity);

        info!(pool = %name, capacity, "worker pool created");

        Self {
            name,
            capacity,
            queue,
            metrics,
            inner: Mutex::new(PoolInner {
                slots: (0..capacity).map(|_| None).collect(),
                active: 0,
                stopped: false,
                retired: Vec::new(),
            }),
            stopped_cv: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of worker slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of running workers.
    pub fn active_workers(&self) -> usize {
        self.lock().active
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Snapshot of occupied slots as `(slot, state)`.
    pub fn worker_states(&self) -> Vec<(usize, WorkerState)> {
        self.lock()
            .slots
            .iter()
            .flatten()
            .map(|w| (w.id(), w.state()))
            .collect()
    }

    /// Start workers until `target` are active.
    ///
    /// Fails with [`PoolError::InvalidWorkerCount`] when `target` exceeds
    /// the capacity or is below the current active count.
    pub fn grow_active_workers(&self, target: usize) -> PoolResult<usize> {
        let mut inner = self.lock();
        self.grow_locked(&mut inner, target)
    }

    /// Stop workers until `target` are active.
    ///
    /// Idle workers are chosen first; executing ones finish their task
    /// before exiting. Returns once every chosen worker has exited.
    pub fn shrink_active_workers(&self, target: usize) -> PoolResult<usize> {
        let mut inner = self.lock();
        self.shrink_locked(&mut inner, target)
    }

    /// Clamp `target` to the capacity and grow or shrink to it.
    pub fn set_active_workers(&self, target: usize) -> PoolResult<usize> {
        let mut inner = self.lock();

        let target = if target > self.capacity {
            debug!(
                pool = %self.name,
                requested = target,
                capacity = self.capacity,
                "requested workers exceed capacity, clamping"
            );
            self.capacity
        } else {
            target
        };

        if target == inner.active {
            return Ok(inner.active);
        }

        if target > inner.active {
            self.grow_locked(&mut inner, target)
        } else {
            self.shrink_locked(&mut inner, target)
        }
    }

    fn grow_locked(&self, inner: &mut PoolInner, target: usize) -> PoolResult<usize> {
        if inner.stopped {
            return Err(PoolError::Stopped);
        }
        if target > self.capacity || target < inner.active {
            return Err(PoolError::InvalidWorkerCount {
                requested: target,
                active: inner.active,
                capacity: self.capacity,
            });
        }

        debug!(pool = %self.name, from = inner.active, to = target, "growing workers");

        let needed = target - inner.active;
        let free: Vec<usize> = inner
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(i, _)| i)
            .take(needed)
            .collect();

        for slot in free {
            let worker = Worker::spawn(
                slot,
                &self.name,
                Arc::clone(&self.queue),
                Arc::clone(&self.metrics),
            )
            .map_err(PoolError::Spawn);

            let worker = match worker {
                Ok(w) => w,
                Err(e) => {
                    self.metrics.update_worker_metrics(inner.active, self.capacity);
                    return Err(e);
                }
            };

            inner.slots[slot] = Some(worker);
            inner.active += 1;
        }

        self.metrics.update_worker_metrics(inner.active, self.capacity);
        Ok(inner.active)
    }

    fn shrink_locked(&self, inner: &mut PoolInner, target: usize) -> PoolResult<usize> {
        if inner.stopped {
            return Err(PoolError::Stopped);
        }
        if target > inner.active {
            return Err(PoolError::InvalidWorkerCount {
                requested: target,
                active: inner.active,
                capacity: self.capacity,
            });
        }

        debug!(pool = %self.name, from = inner.active, to = target, "shrinking workers");

        let kill_count = inner.active - target;

        // Idle workers first, then whoever is executing
        let mut candidates: Vec<(usize, WorkerState)> = inner
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|w| (i, w.state())))
            .collect();
        candidates.sort_by_key(|(i, state)| (*state != WorkerState::Idle, *i));
        let selected: Vec<usize> = candidates
            .into_iter()
            .map(|(i, _)| i)
            .take(kill_count)
            .collect();

        let killed: Vec<Worker> = selected
            .into_iter()
            .filter_map(|i| inner.slots[i].take())
            .collect();

        for worker in &killed {
            worker.kill();
        }
        inner.active -= killed.len();

        for worker in killed {
            worker.join();
        }

        self.metrics.update_worker_metrics(inner.active, self.capacity);
        Ok(inner.active)
    }

    /// Stop the pool for good, close the queue to new work and kill every
    /// worker.
    ///
    /// Does not wait for workers to exit; use [`join`](Self::join) for that.
    /// Calling it again is a no-op.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if inner.stopped {
            return;
        }
        inner.stopped = true;
        self.queue.close();

        info!(pool = %self.name, active = inner.active, "stopping worker pool");

        let workers: Vec<Worker> = inner.slots.iter_mut().filter_map(Option::take).collect();
        for worker in &workers {
            worker.kill();
        }
        inner.active = 0;
        inner.retired.extend(workers);

        self.metrics.update_worker_metrics(0, self.capacity);
        self.stopped_cv.notify_all();
    }

    /// Block until the pool is stopped and all of its threads have exited.
    pub fn join(&self) {
        let retired = {
            let mut inner = self.lock();
            while !inner.stopped {
                inner = self
                    .stopped_cv
                    .wait(inner)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            mem::take(&mut inner.retired)
        };

        let count = retired.len();
        for worker in retired {
            worker.join();
        }

        debug!(pool = %self.name, joined = count, "worker threads joined");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::task::task_fn;
    use std::num::NonZeroUsize;
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn pool(capacity: usize) -> (WorkerPool, Arc<JobQueue<BoxedTask>>) {
        let queue = Arc::new(JobQueue::bounded(NonZeroUsize::new(64).unwrap()));
        let metrics = Arc::new(Metrics::new().unwrap());
        (
            WorkerPool::new(capacity, "test", Arc::clone(&queue), metrics),
            queue,
        )
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_grow_and_shrink() {
        let (pool, _queue) = pool(8);

        assert_eq!(pool.grow_active_workers(5).unwrap(), 5);
        assert_eq!(pool.active_workers(), 5);
        let slots: Vec<_> = pool.worker_states().into_iter().map(|(i, _)| i).collect();
        assert_eq!(slots, vec![0, 1, 2, 3, 4]);

        assert_eq!(pool.shrink_active_workers(2).unwrap(), 2);
        assert_eq!(pool.active_workers(), 2);
        assert_eq!(pool.worker_states().len(), 2);

        pool.stop();
        pool.join();
    }

    #[test]
    fn test_grow_fills_free_slots_in_order() {
        let (pool, _queue) = pool(4);
        pool.grow_active_workers(4).unwrap();
        pool.shrink_active_workers(2).unwrap();
        pool.grow_active_workers(3).unwrap();

        let mut slots: Vec<_> = pool.worker_states().into_iter().map(|(i, _)| i).collect();
        slots.sort_unstable();
        assert_eq!(slots.len(), 3);
        // Shrink emptied slots 0 and 1 (all idle), so growth refills slot 0
        assert_eq!(slots, vec![0, 2, 3]);

        pool.stop();
        pool.join();
    }

    #[test]
    fn test_grow_beyond_capacity_fails() {
        let (pool, _queue) = pool(4);
        let err = pool.grow_active_workers(5).unwrap_err();
        assert!(err.is_invalid_count());
        assert_eq!(pool.active_workers(), 0);

        pool.stop();
        pool.join();
    }

    #[test]
    fn test_shrink_above_active_fails() {
        let (pool, _queue) = pool(4);
        pool.grow_active_workers(2).unwrap();
        assert!(pool.shrink_active_workers(3).unwrap_err().is_invalid_count());

        pool.stop();
        pool.join();
    }

    #[test]
    fn test_set_active_clamps_to_capacity() {
        let (pool, _queue) = pool(6);
        assert_eq!(pool.set_active_workers(100).unwrap(), 6);
        assert_eq!(pool.set_active_workers(6).unwrap(), 6);
        assert_eq!(pool.set_active_workers(0).unwrap(), 0);
        assert_eq!(pool.active_workers(), 0);

        pool.stop();
        pool.join();
    }

    #[test]
    fn test_shrink_prefers_idle_workers() {
        let (pool, queue) = pool(3);
        pool.grow_active_workers(3).unwrap();

        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (finished_tx, finished_rx) = mpsc::channel();
        queue.enqueue(task_fn(move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            finished_tx.send(()).unwrap();
            Ok(())
        }));
        started_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        let busy: Vec<_> = pool
            .worker_states()
            .into_iter()
            .filter(|(_, s)| *s == WorkerState::Executing)
            .collect();
        assert_eq!(busy.len(), 1);
        let busy_slot = busy[0].0;

        // The two idle workers go; shrink returns without the busy task finishing
        assert_eq!(pool.shrink_active_workers(1).unwrap(), 1);
        assert!(finished_rx.try_recv().is_err());
        assert_eq!(
            pool.worker_states(),
            vec![(busy_slot, WorkerState::Executing)]
        );

        release_tx.send(()).unwrap();
        finished_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        pool.stop();
        pool.join();
    }

    #[test]
    fn test_shrink_takes_executing_when_not_enough_idle() {
        let (pool, queue) = pool(2);
        pool.grow_active_workers(2).unwrap();

        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Arc::new(Mutex::new(release_rx));
        for _ in 0..2 {
            let started_tx = started_tx.clone();
            let release_rx = Arc::clone(&release_rx);
            queue.enqueue(task_fn(move || {
                started_tx.send(()).unwrap();
                release_rx.lock().unwrap().recv().unwrap();
                Ok(())
            }));
        }
        started_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        started_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        let shrinker = {
            let release_tx = release_tx.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                release_tx.send(()).unwrap();
                release_tx.send(()).unwrap();
            })
        };

        // Blocks until both executing workers finish and exit
        assert_eq!(pool.shrink_active_workers(0).unwrap(), 0);
        assert!(pool.worker_states().is_empty());
        shrinker.join().unwrap();

        pool.stop();
        pool.join();
    }

    #[test]
    fn test_stop_is_terminal() {
        let (pool, queue) = pool(4);
        pool.grow_active_workers(3).unwrap();

        pool.stop();
        pool.stop();
        assert!(pool.is_stopped());
        assert_eq!(pool.active_workers(), 0);
        assert!(queue.is_closed());
        assert!(!queue.enqueue(task_fn(|| Ok(()))));

        assert!(pool.grow_active_workers(2).unwrap_err().is_stopped());
        assert!(pool.shrink_active_workers(0).unwrap_err().is_stopped());
        assert!(pool.set_active_workers(4).unwrap_err().is_stopped());

        pool.join();
        assert!(pool.worker_states().is_empty());
    }

    #[test]
    fn test_join_waits_for_stop() {
        let (pool, _queue) = pool(2);
        pool.grow_active_workers(2).unwrap();
        let pool = Arc::new(pool);

        let (done_tx, done_rx) = mpsc::channel();
        {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                pool.join();
                done_tx.send(()).unwrap();
            });
        }

        thread::sleep(Duration::from_millis(50));
        assert!(done_rx.try_recv().is_err(), "join returned before stop");

        pool.stop();
        done_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn test_active_stays_within_bounds() {
        let (pool, _queue) = pool(5);
        for target in [3, 9, 0, 5, 1, 7, 2] {
            let active = pool.set_active_workers(target).unwrap();
            assert!(active <= pool.capacity());
            assert_eq!(active, target.min(5));
        }
        wait_until(|| pool.worker_states().iter().all(|(_, s)| *s == WorkerState::Idle));

        pool.stop();
        pool.join();
    }
}
