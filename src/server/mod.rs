//! Command server: TCP accept loop in front of the engine.
//!
//! Each accepted connection gets a welcome line, sends one command, and
//! receives one reply. Commands run on the engine's worker threads; the
//! Tokio side only parses the line, submits the job and waits for the
//! reply. The accept loop ends when the engine's shutdown signal closes.

pub mod connection;
pub mod internal;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

pub use connection::{ConnectionContext, BUSY_MESSAGE, SHUTTING_DOWN_MESSAGE};
pub use internal::{HealthStatus, InternalServer};

use crate::config::Config;
use crate::engine::Engine;
use crate::listener::TcpListener;

/// Bound command server, plus the internal server when configured.
pub struct Server {
    listener: TcpListener,
    internal: Option<InternalServer>,
    ctx: Arc<ConnectionContext>,
    engine: Arc<Engine>,
}

impl Server {
    /// Bind the command listener and, if `INTERNAL_ADDR` is set, the
    /// internal listener.
    pub async fn bind(config: &Config, engine: Arc<Engine>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(config.server.listen_addr).await?;

        let internal = match config.server.internal_addr {
            Some(addr) => {
                Some(InternalServer::bind(addr, Arc::clone(&engine), &config.to_json()).await?)
            }
            None => None,
        };

        let ctx = Arc::new(ConnectionContext::new(
            Arc::clone(&engine),
            config.server.command_timeout,
        ));

        Ok(Self {
            listener,
            internal,
            ctx,
            engine,
        })
    }

    /// Address of the command listener.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Address of the internal server, if one is bound.
    pub fn internal_addr(&self) -> Option<SocketAddr> {
        self.internal.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Accept connections until the engine's shutdown signal closes.
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn run(self) {
        let Server {
            listener,
            internal,
            ctx,
            engine,
        } = self;

        if let Some(internal) = internal {
            tokio::spawn(internal.run());
        }

        if let Ok(addr) = listener.local_addr() {
            info!("Command server listening on {}", addr);
        }

        let shutdown = engine.shutdown_signal().clone();
        let mut next_client: u64 = 0;

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };

                    let client = next_client;
                    next_client += 1;

                    let ctx = Arc::clone(&ctx);
                    tokio::spawn(async move {
                        ctx.handle_connection(stream, remote_addr, client).await;
                    });
                }
                _ = shutdown.closed() => {
                    info!("shutdown signal closed, no longer accepting connections");
                    break;
                }
            }
        }
    }
}
