//! Load client against an in-process server

use std::time::Duration;

use job_server::client::{self, ClientPlan};
use job_server::config::{ClientConfig, EngineConfig, QueueCapacity};
use job_server::observability::ExecutionStatus;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::helpers::*;

#[tokio::test]
async fn test_every_reply_matches() {
    let server = TestServer::start(EngineConfig {
        queue_capacity: QueueCapacity::Bounded(256),
        ..engine_config()
    })
    .await;

    let config = ClientConfig {
        server_addr: server.addr,
        min_clients: 20,
        max_clients: 30,
        min_delay: Duration::ZERO,
        max_delay: Duration::from_millis(20),
        commands_per_client: 3,
    };
    let plans = client::plan_load(&config, &mut StdRng::seed_from_u64(9898));
    let sent: usize = plans.iter().map(|p| p.commands.len()).sum();

    let summary = client::run_plans(server.addr, plans).await;

    assert_eq!(summary.failed, 0);
    assert_eq!(summary.mismatched, 0);
    assert_eq!(summary.replies(), sent);
    assert_eq!(summary.ok, sent, "queue is large enough for every command");

    let metrics = std::sync::Arc::clone(server.engine.metrics());
    eventually(|| metrics.executed(ExecutionStatus::Ok) as usize == sent).await;
}

#[tokio::test]
async fn test_busy_replies_are_counted() {
    let server = TestServer::start(EngineConfig {
        queue_capacity: QueueCapacity::Bounded(1),
        baseline_workers: 0,
        low_threshold: 100,
        high_threshold: 200,
        ..engine_config()
    })
    .await;

    // Nobody drains the queue: the first command waits, the rest bounce
    let first = tokio::spawn(client::send_command(server.addr, "ADD,1,2"));
    eventually(|| server.engine.queue_depth() == 1).await;

    let plans = (0..5)
        .map(|index| ClientPlan {
            index,
            delay: Duration::ZERO,
            commands: vec![format!("MUL,{},2", index)],
        })
        .collect();
    let summary = client::run_plans(server.addr, plans).await;

    assert_eq!(summary.busy, 5);
    assert_eq!(summary.replies(), 5);

    server.engine.shutdown();
    let reply = first.await.unwrap().unwrap();
    assert_eq!(reply, "Server is shutting down");
}
