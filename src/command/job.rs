//! The task that runs one client command on a worker thread.

use tokio::sync::oneshot;
use tracing::{debug, info};

use super::{response_for, Command, CommandError};
use crate::engine::{ShutdownSignal, Task, TaskError};

/// One client's command, queued for a worker.
///
/// The reply goes back to the connection through `reply`. If the job is
/// dropped without running (queue drained at shutdown), the connection
/// sees the sender go away instead.
pub struct CommandJob {
    client: u64,
    line: String,
    reply: oneshot::Sender<String>,
    shutdown: ShutdownSignal,
}

impl CommandJob {
    pub fn new(
        client: u64,
        line: impl Into<String>,
        reply: oneshot::Sender<String>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            client,
            line: line.into(),
            reply,
            shutdown,
        }
    }
}

impl Task for CommandJob {
    fn execute(self: Box<Self>) -> Result<(), TaskError> {
        let CommandJob {
            client,
            line,
            reply,
            shutdown,
        } = *self;

        debug!(client, command = %line, "running command");

        let outcome = Command::parse(&line).and_then(|cmd| {
            let text = cmd.evaluate()?;
            if cmd.is_kill() {
                info!(client, "kill command received");
                shutdown.request();
            }
            Ok::<_, CommandError>(text)
        });

        if reply.send(response_for(&line, &outcome)).is_err() {
            debug!(client, "client went away before the reply");
        }

        outcome
            .map(|_| ())
            .map_err(|e| TaskError::new(format!("client {}: {}", client, e)))
    }
}
