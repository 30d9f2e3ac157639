//! Listening sockets for the command server.
//!
//! The socket is built with `socket2` so address reuse, backlog and
//! per-connection TCP options are set explicitly, then handed to Tokio.

mod tcp;

pub use tcp::{TcpListener, DEFAULT_BACKLOG};
