//! Per-connection dialog of the command protocol.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::command::CommandJob;
use crate::engine::Engine;
use crate::observability::Metrics;

/// Sent when the queue refuses a job.
pub const BUSY_MESSAGE: &str =
    "Server is too busy to handle request right now, please try again later";

/// Sent when a job will never run because the server is going down.
pub const SHUTTING_DOWN_MESSAGE: &str = "Server is shutting down";

/// Welcome line for client number `client`.
pub fn welcome_message(client: u64) -> String {
    format!("Hello, you are client #{}.", client)
}

/// Shared state for all connection handlers.
pub struct ConnectionContext {
    engine: Arc<Engine>,
    command_timeout: Option<Duration>,
}

/// Keeps the open-connections gauge in step, including on early return.
struct ConnectionGuard<'a>(&'a Metrics);

impl<'a> ConnectionGuard<'a> {
    fn new(metrics: &'a Metrics) -> Self {
        metrics.inc_connections();
        Self(metrics)
    }
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.0.dec_connections();
    }
}

impl ConnectionContext {
    pub fn new(engine: Arc<Engine>, command_timeout: Option<Duration>) -> Self {
        Self {
            engine,
            command_timeout,
        }
    }

    /// Run the dialog for one client and close the connection.
    pub async fn handle_connection<S>(&self, stream: S, remote_addr: SocketAddr, client: u64)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let _guard = ConnectionGuard::new(self.engine.metrics());
        debug!(client, remote = %remote_addr, "client connected");

        if let Err(e) = self.dialog(stream, client).await {
            warn!(client, error = %e, "connection error");
        }

        debug!(client, "connection closed");
    }

    async fn dialog<S>(&self, stream: S, client: u64) -> io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut stream = BufReader::new(stream);
        write_line(&mut stream, &welcome_message(client)).await?;

        let Some(line) = self.read_command(&mut stream, client).await? else {
            return stream.shutdown().await;
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let shutdown = self.engine.shutdown_signal().clone();
        let job = CommandJob::new(client, line, reply_tx, shutdown.clone());

        if !self.engine.submit(Box::new(job)) {
            let message = if shutdown.is_requested() {
                SHUTTING_DOWN_MESSAGE
            } else {
                info!(client, "too busy, rejected client");
                BUSY_MESSAGE
            };
            write_line(&mut stream, message).await?;
            return stream.shutdown().await;
        }

        // The sender is dropped unanswered if the job is discarded at shutdown
        let reply = reply_rx
            .await
            .unwrap_or_else(|_| SHUTTING_DOWN_MESSAGE.to_string());
        write_line(&mut stream, &reply).await?;
        debug!(client, "responded");

        stream.shutdown().await
    }

    /// Read the command line, or `None` on EOF or timeout.
    async fn read_command<R>(&self, reader: &mut R, client: u64) -> io::Result<Option<String>>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = String::new();
        let read = reader.read_line(&mut line);

        let n = match self.command_timeout {
            Some(limit) => match tokio::time::timeout(limit, read).await {
                Ok(result) => result?,
                Err(_) => {
                    info!(
                        client,
                        timeout_ms = limit.as_millis() as u64,
                        "timed out waiting for command"
                    );
                    return Ok(None);
                }
            },
            None => read.await?,
        };

        if n == 0 {
            info!(client, "bad input");
            return Ok(None);
        }

        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }
}

async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
