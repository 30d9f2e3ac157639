//! Internal server tests (/health, /metrics, /config)

use job_server::observability::ExecutionStatus;
use reqwest::StatusCode;

use crate::helpers::*;

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::start(engine_config()).await;
    let resp = server.internal_get("/health").await;

    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("application/json"));

    let json: serde_json::Value = resp.json().await.expect("Should be valid JSON");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["pool_capacity"], 8);
    assert_eq!(json["active_workers"], 2);
    let idle = json["idle_workers"].as_u64().unwrap();
    let executing = json["executing_workers"].as_u64().unwrap();
    assert_eq!(idle + executing, 2);
    assert!(json["timestamp"].as_u64().unwrap() > 0);
    assert!(json.get("queue_depth").is_some());
    assert!(json.get("active_connections").is_some());

    server.engine.shutdown();
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let server = TestServer::start(engine_config()).await;
    assert_eq!(server.send("ADD,1,2").await, "1 + 2 = 3");
    // The reply goes out before the worker records the execution
    let engine = server.engine.clone();
    eventually(|| engine.metrics().executed(ExecutionStatus::Ok) == 1).await;

    let resp = server.internal_get("/metrics").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = resp.text().await.unwrap();
    assert!(body.contains("job_server_jobs_submitted_total{outcome=\"accepted\"} 1"));
    assert!(body.contains("job_server_jobs_executed_total{status=\"ok\"} 1"));
    assert!(body.contains("job_server_workers_capacity 8"));

    server.engine.shutdown();
}

#[tokio::test]
async fn test_config_endpoint() {
    let server = TestServer::start(engine_config()).await;
    let resp = server.internal_get("/config").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["engine"]["pool_capacity"], 8);
    assert_eq!(json["engine"]["queue_capacity"], "16");
    assert_eq!(json["engine"]["poll_interval_ms"], 10);

    server.engine.shutdown();
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let server = TestServer::start(engine_config()).await;
    let resp = server.internal_get("/nope").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    server.engine.shutdown();
}
