//! job_server - line-protocol job server with an autoscaling worker pool.
//!
//! Clients connect over TCP, send one command (`ADD,2,3`, `KILL`, ...) and
//! get one reply. Commands are queued on a bounded FIFO and run by a pool
//! of worker threads whose active count follows the queue depth.
//!
//! # Architecture
//!
//! ```text
//! connections ──submit──▶ JobQueue ──dequeue──▶ WorkerPool (N of capacity)
//!                              ▲                      ▲
//!                              └──── depth ── Controller ── resize
//! ```
//!
//! - [`engine`]: queue, workers, pool, controller and shutdown signal
//! - [`command`]: command grammar and the job that runs it
//! - [`server`]: TCP accept loop, per-connection dialog, internal HTTP server
//! - [`client`]: load generator behind the `job_client` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use job_server::{Config, engine::{Engine, ShutdownSignal}, server::Server};
//!
//! let config = Config::from_env()?;
//! let engine = Arc::new(Engine::start(&config.engine, ShutdownSignal::new())?);
//! let server = Server::bind(&config, Arc::clone(&engine)).await?;
//! server.run().await;
//! engine.shutdown();
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars) with optional "-dirty" suffix
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string: "0.1.0 (abc12345)" or "0.1.0 (abc12345-dirty)"
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod client;
pub mod command;
pub mod config;
pub mod engine;
pub mod listener;
pub mod logging;
pub mod observability;
pub mod server;

// Re-exports for convenience
pub use config::Config;
pub use engine::{Engine, ShutdownSignal};
pub use server::Server;
