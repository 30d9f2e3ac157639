//! Internal HTTP server for /health, /metrics and /config.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming as IncomingBody;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::engine::{Engine, WorkerState};
use crate::listener::TcpListener;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// `ok`, or `stopping` once shutdown was requested.
    pub status: &'static str,
    /// Seconds since the UNIX epoch.
    pub timestamp: u64,
    pub queue_depth: usize,
    pub active_workers: usize,
    /// Active workers parked on the queue.
    pub idle_workers: usize,
    /// Active workers running a task.
    pub executing_workers: usize,
    pub pool_capacity: usize,
    pub active_connections: i64,
}

impl HealthStatus {
    fn of(engine: &Engine) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let status = if engine.shutdown_signal().is_requested() {
            "stopping"
        } else {
            "ok"
        };
        let states = engine.worker_states();
        let executing_workers = states
            .iter()
            .filter(|(_, state)| *state == WorkerState::Executing)
            .count();
        let idle_workers = states
            .iter()
            .filter(|(_, state)| *state == WorkerState::Idle)
            .count();

        Self {
            status,
            timestamp,
            queue_depth: engine.queue_depth(),
            active_workers: engine.active_workers(),
            idle_workers,
            executing_workers,
            pool_capacity: engine.pool_capacity(),
            active_connections: engine.metrics().connections_active.get(),
        }
    }
}

/// Shared state of the internal server.
struct InternalState {
    engine: Arc<Engine>,
    /// Pre-rendered `/config` body.
    config_json: String,
}

/// Bound internal server, not yet serving.
pub struct InternalServer {
    listener: TcpListener,
    state: Arc<InternalState>,
}

impl InternalServer {
    pub async fn bind(
        addr: SocketAddr,
        engine: Arc<Engine>,
        config: &serde_json::Value,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let config_json = serde_json::to_string_pretty(config).unwrap_or_else(|_| "{}".to_string());

        Ok(Self {
            listener,
            state: Arc::new(InternalState {
                engine,
                config_json,
            }),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until the engine's shutdown signal closes.
    pub async fn run(self) {
        let shutdown = self.state.engine.shutdown_signal().clone();
        if let Ok(addr) = self.local_addr() {
            info!("Internal server listening on http://{}", addr);
        }

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, _) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "internal accept failed");
                            continue;
                        }
                    };
                    let state = Arc::clone(&self.state);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { handle_internal_request(req, &state).await }
                        });

                        let io = TokioIo::new(stream);
                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            debug!(error = %e, "internal connection error");
                        }
                    });
                }
                _ = shutdown.closed() => break,
            }
        }

        debug!("internal server stopped");
    }
}

/// Handle internal server requests (/health, /metrics, /config).
async fn handle_internal_request(
    req: Request<IncomingBody>,
    state: &InternalState,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::GET {
        return Ok(text_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method Not Allowed",
        ));
    }

    let response = match req.uri().path() {
        "/health" => {
            let health = HealthStatus::of(&state.engine);
            let status = if health.status == "ok" {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            let body = serde_json::to_string(&health).unwrap_or_else(|_| "{}".to_string());
            response(status, "application/json", body)
        }
        "/metrics" => response(
            StatusCode::OK,
            "text/plain; version=0.0.4; charset=utf-8",
            state.engine.metrics().export(),
        ),
        "/config" => response(
            StatusCode::OK,
            "application/json",
            state.config_json.clone(),
        ),
        _ => text_response(StatusCode::NOT_FOUND, "Not Found"),
    };

    Ok(response)
}

fn response(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(body)));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    response(status, "text/plain", body.to_string())
}
