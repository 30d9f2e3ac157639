//! Engine behavior end to end, without the network layer.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use job_server::config::{EngineConfig, QueueCapacity};
use job_server::engine::{task_fn, Engine, ShutdownSignal};

use crate::helpers::*;

#[tokio::test]
async fn test_no_loss_no_duplication() {
    let engine = Arc::new(
        Engine::start(
            &EngineConfig {
                queue_capacity: QueueCapacity::Unbounded,
                ..engine_config()
            },
            ShutdownSignal::new(),
        )
        .unwrap(),
    );

    let seen = Arc::new(Mutex::new(HashSet::new()));
    let runs = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let engine = Arc::clone(&engine);
            let seen = Arc::clone(&seen);
            let runs = Arc::clone(&runs);
            thread::spawn(move || {
                for i in 0..250 {
                    let seen = Arc::clone(&seen);
                    let runs = Arc::clone(&runs);
                    assert!(engine.submit(task_fn(move || {
                        runs.fetch_add(1, Ordering::SeqCst);
                        seen.lock().unwrap().insert((p, i));
                        Ok(())
                    })));
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }

    let counter = Arc::clone(&runs);
    eventually(|| counter.load(Ordering::SeqCst) == 1000).await;
    assert_eq!(seen.lock().unwrap().len(), 1000);

    engine.shutdown();
    assert_eq!(runs.load(Ordering::SeqCst), 1000);
}

#[tokio::test]
async fn test_pool_grows_under_load_and_returns_to_baseline() {
    let engine = Engine::start(
        &EngineConfig {
            pool_capacity: 16,
            queue_capacity: QueueCapacity::Bounded(64),
            baseline_workers: 1,
            low_threshold: 2,
            high_threshold: 40,
            poll_interval: Duration::from_millis(5),
        },
        ShutdownSignal::new(),
    )
    .unwrap();

    for _ in 0..48 {
        assert!(engine.submit(task_fn(|| {
            thread::sleep(Duration::from_millis(20));
            Ok(())
        })));
    }

    eventually(|| engine.active_workers() > 1).await;

    let depth_check = || engine.queue_depth() == 0 && engine.active_workers() == 1;
    tokio::time::timeout(Duration::from_secs(5), async {
        while !depth_check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("pool did not settle back to baseline");

    engine.shutdown();
}
