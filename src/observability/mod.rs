//! Observability: Prometheus metrics.
//!
//! Structured logging lives in [`crate::logging`]; this module holds the
//! metrics registry shared by the engine and the server.
//!
//! ```rust,ignore
//! use job_server::observability::Metrics;
//!
//! let metrics = Metrics::new()?;
//! metrics.record_submission(true);
//! println!("{}", metrics.export());
//! ```

pub mod metrics;

pub use metrics::{ExecutionStatus, Metrics};
