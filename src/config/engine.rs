//! Engine configuration: pool, queue and controller settings.

use std::fmt;
use std::time::Duration;

use super::parse::{env_duration, env_or, env_parse};
use super::ConfigError;

/// Pending-task limit of the job queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueCapacity {
    Bounded(usize),
    Unbounded,
}

impl fmt::Display for QueueCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueCapacity::Bounded(n) => write!(f, "{}", n),
            QueueCapacity::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Engine configuration.
///
/// Fields are public so tests and embedders can build one directly;
/// [`validate`](Self::validate) runs before any thread is started.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of worker slots.
    pub pool_capacity: usize,
    /// Pending-task limit.
    pub queue_capacity: QueueCapacity,
    /// Active workers when the queue is calm.
    pub baseline_workers: usize,
    /// Depth at or below which the pool returns to the baseline.
    pub low_threshold: usize,
    /// Depth guarding the halving rule.
    pub high_threshold: usize,
    /// Controller sampling period.
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_capacity: 50,
            queue_capacity: QueueCapacity::Bounded(50),
            baseline_workers: 5,
            low_threshold: 10,
            high_threshold: 20,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let pool_capacity = env_parse("POOL_CAPACITY", 50usize)?;
        let queue_capacity = Self::parse_queue_capacity(pool_capacity)?;

        // "off" or "0" leave a zero interval behind for validate() to reject
        let poll_interval = env_duration("POLL_INTERVAL", "100ms")?.unwrap_or(Duration::ZERO);

        let config = Self {
            pool_capacity,
            queue_capacity,
            baseline_workers: env_parse("BASELINE_WORKERS", 5usize)?,
            low_threshold: env_parse("SCALE_LOW_THRESHOLD", 10usize)?,
            high_threshold: env_parse("SCALE_HIGH_THRESHOLD", 20usize)?,
            poll_interval,
        };
        config.validate()?;
        Ok(config)
    }

    fn parse_queue_capacity(pool_capacity: usize) -> Result<QueueCapacity, ConfigError> {
        let raw = env_or("QUEUE_CAPACITY", "");
        match raw.trim().to_lowercase().as_str() {
            "" => Ok(QueueCapacity::Bounded(pool_capacity)),
            "unbounded" => Ok(QueueCapacity::Unbounded),
            value => value
                .parse()
                .map(QueueCapacity::Bounded)
                .map_err(|e: std::num::ParseIntError| ConfigError::Parse {
                    key: "QUEUE_CAPACITY".into(),
                    value: raw.clone(),
                    error: e.to_string(),
                }),
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_capacity == 0 {
            return Err(ConfigError::invalid(
                "POOL_CAPACITY",
                "pool capacity cannot be zero",
            ));
        }
        if self.queue_capacity == QueueCapacity::Bounded(0) {
            return Err(ConfigError::invalid(
                "QUEUE_CAPACITY",
                "queue capacity cannot be zero",
            ));
        }
        if self.baseline_workers > self.pool_capacity {
            return Err(ConfigError::invalid(
                "BASELINE_WORKERS",
                format!(
                    "baseline {} exceeds pool capacity {}",
                    self.baseline_workers, self.pool_capacity
                ),
            ));
        }
        if self.low_threshold >= self.high_threshold {
            return Err(ConfigError::invalid(
                "SCALE_LOW_THRESHOLD",
                format!(
                    "low threshold {} must be below high threshold {}",
                    self.low_threshold, self.high_threshold
                ),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::invalid(
                "POLL_INTERVAL",
                "poll interval cannot be zero",
            ));
        }
        Ok(())
    }
}
