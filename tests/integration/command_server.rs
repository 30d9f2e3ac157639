//! Command protocol tests over real TCP connections.

use std::time::Duration;

use job_server::config::{EngineConfig, QueueCapacity};
use job_server::server::{BUSY_MESSAGE, SHUTTING_DOWN_MESSAGE};
use tokio::net::TcpStream;

use crate::helpers::*;

#[tokio::test]
async fn test_welcome_and_arithmetic() {
    let server = TestServer::start(engine_config()).await;

    let mut client = server.connect().await;
    assert_eq!(client.welcome, "Hello, you are client #0.");
    client.send("ADD,2,3").await;
    assert_eq!(client.reply().await, "2 + 3 = 5");

    assert_eq!(server.send("SUB,10,4").await, "10 - 4 = 6");
    assert_eq!(server.send("MUL,-3,7").await, "-3 * 7 = -21");
    assert_eq!(server.send("DIV,9,2").await, "9 / 2 = 4");

    server.engine.shutdown();
}

#[tokio::test]
async fn test_client_numbers_increase() {
    let server = TestServer::start(engine_config()).await;

    for n in 0..3 {
        let client = server.connect().await;
        assert_eq!(client.welcome, format!("Hello, you are client #{}.", n));
    }

    server.engine.shutdown();
}

#[tokio::test]
async fn test_error_replies() {
    let server = TestServer::start(engine_config()).await;

    assert_eq!(server.send("POW,2,3").await, "Unknown command POW,2,3");
    assert_eq!(
        server.send("DIV,1,0").await,
        "Error occurred when executing command: DIV,1,0"
    );
    assert_eq!(
        server.send("ADD,x,1").await,
        "Error occurred when executing command: ADD,x,1"
    );

    server.engine.shutdown();
}

#[tokio::test]
async fn test_busy_rejection_and_dropped_job() {
    // No workers and a one-slot queue: the first job parks, the second bounces
    let server = TestServer::start(EngineConfig {
        baseline_workers: 0,
        queue_capacity: QueueCapacity::Bounded(1),
        low_threshold: 100,
        high_threshold: 200,
        ..engine_config()
    })
    .await;

    let mut waiting = server.connect().await;
    waiting.send("ADD,1,1").await;
    let engine = server.engine.clone();
    eventually(|| engine.queue_depth() == 1).await;

    assert_eq!(server.send("ADD,2,2").await, BUSY_MESSAGE);
    assert_eq!(server.engine.metrics().rejected(), 1);

    // Shutdown discards the parked job and its client is told so
    server.engine.shutdown();
    assert_eq!(waiting.reply().await, SHUTTING_DOWN_MESSAGE);
}

#[tokio::test]
async fn test_kill_shuts_server_down() {
    let server = TestServer::start(engine_config()).await;

    assert_eq!(server.send("KILL").await, "Killing server");

    // The controller stops the pool and closes the signal; the accept loop ends
    tokio::time::timeout(Duration::from_secs(2), server.handle)
        .await
        .expect("server did not stop after KILL")
        .unwrap();

    assert!(server.engine.shutdown_signal().is_closed());
    assert_eq!(server.engine.active_workers(), 0);
    assert!(TcpStream::connect(server.addr).await.is_err());

    server.engine.shutdown();
}

#[tokio::test]
async fn test_concurrent_clients() {
    let server = TestServer::start(engine_config()).await;

    let replies = send_all(&server, 12).await;
    for (i, reply) in replies.into_iter().enumerate() {
        assert_eq!(reply, format!("{} + 1 = {}", i, i + 1));
    }

    server.engine.shutdown();
}

async fn send_all(server: &TestServer, n: usize) -> Vec<String> {
    let mut clients = Vec::with_capacity(n);
    for i in 0..n {
        let mut client = server.connect().await;
        client.send(&format!("ADD,{},1", i)).await;
        clients.push(client);
    }

    let mut replies = Vec::with_capacity(n);
    for client in clients {
        replies.push(client.reply().await);
    }
    replies
}
