//! Process-wide shutdown context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Shared shutdown state, created once at startup and handed to the
/// controller, the server and any task that may end the process.
///
/// Two stages:
/// - *requested*: someone (a `KILL` command, Ctrl-C) asked for shutdown.
///   The controller polls this every iteration.
/// - *closed*: the controller has stopped the pool. Listeners waiting on
///   [`closed`](Self::closed) stop accepting connections.
#[derive(Clone)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

struct Inner {
    requested: AtomicBool,
    closed_tx: watch::Sender<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (closed_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                requested: AtomicBool::new(false),
                closed_tx,
            }),
        }
    }

    /// Ask for shutdown. Idempotent.
    pub fn request(&self) {
        if !self.inner.requested.swap(true, Ordering::SeqCst) {
            tracing::info!("shutdown requested");
        }
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Mark shutdown complete and release everything waiting in
    /// [`closed`](Self::closed). Implies [`request`](Self::request).
    pub fn close(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
        self.inner.closed_tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed_tx.borrow()
    }

    /// Wait until [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        let mut rx = self.inner.closed_tx.subscribe();
        // The sender lives in `self`, so this cannot fail while we wait.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("requested", &self.is_requested())
            .field("closed", &self.is_closed())
            .finish()
    }
}
