//! Engine error types.

use std::fmt;
use std::io;

use crate::config::ConfigError;

/// Errors returned by worker pool operations.
#[derive(Debug)]
pub enum PoolError {
    /// Requested active count is outside what the operation allows.
    InvalidWorkerCount {
        /// Requested active worker count.
        requested: usize,
        /// Current active count when the request was made.
        active: usize,
        /// Pool capacity.
        capacity: usize,
    },

    /// The pool has been stopped and can no longer be resized.
    Stopped,

    /// A worker thread could not be spawned.
    Spawn(io::Error),
}

impl PoolError {
    /// Check if this is a stopped-pool error.
    pub fn is_stopped(&self) -> bool {
        matches!(self, PoolError::Stopped)
    }

    /// Check if this is an invalid worker count error.
    pub fn is_invalid_count(&self) -> bool {
        matches!(self, PoolError::InvalidWorkerCount { .. })
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::InvalidWorkerCount {
                requested,
                active,
                capacity,
            } => write!(
                f,
                "invalid worker count {} (active {}, capacity {})",
                requested, active, capacity
            ),
            PoolError::Stopped => write!(f, "worker pool has been stopped"),
            PoolError::Spawn(e) => write!(f, "failed to spawn worker thread: {}", e),
        }
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PoolError::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors raised while starting the engine.
#[derive(Debug)]
pub enum EngineError {
    /// Configuration rejected before any thread was started.
    Config(ConfigError),

    /// Initial pool sizing failed.
    Pool(PoolError),

    /// Metrics registry could not be built.
    Metrics(prometheus::Error),

    /// Controller thread could not be spawned.
    Spawn(io::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Config(e) => write!(f, "invalid engine configuration: {}", e),
            EngineError::Pool(e) => write!(f, "worker pool error: {}", e),
            EngineError::Metrics(e) => write!(f, "metrics registry error: {}", e),
            EngineError::Spawn(e) => write!(f, "failed to spawn controller thread: {}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Config(e) => Some(e),
            EngineError::Pool(e) => Some(e),
            EngineError::Metrics(e) => Some(e),
            EngineError::Spawn(e) => Some(e),
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        EngineError::Config(e)
    }
}

impl From<PoolError> for EngineError {
    fn from(e: PoolError) -> Self {
        EngineError::Pool(e)
    }
}

impl From<prometheus::Error> for EngineError {
    fn from(e: prometheus::Error) -> Self {
        EngineError::Metrics(e)
    }
}

/// Error reported by a task's `execute`.
///
/// The engine only logs it; the task is expected to have told its
/// submitter whatever needs telling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskError(String);

impl TaskError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TaskError {}

impl From<String> for TaskError {
    fn from(msg: String) -> Self {
        TaskError(msg)
    }
}

impl From<&str> for TaskError {
    fn from(msg: &str) -> Self {
        TaskError(msg.to_string())
    }
}
