//! Configuration module for job_server.
//!
//! This module provides centralized configuration loading from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use job_server::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Listen address: {}", config.server.listen_addr);
//! println!("Workers: {}", config.engine.pool_capacity);
//! ```

mod client;
mod engine;
mod error;
mod logging;
mod parse;
mod server;

pub use client::ClientConfig;
pub use engine::{EngineConfig, QueueCapacity};
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::parse_duration;
pub use server::ServerConfig;

/// Complete application configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Pool, queue and controller configuration.
    pub engine: EngineConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            engine: EngineConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Effective configuration as JSON, served on `/config`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "server": {
                "listen_addr": self.server.listen_addr.to_string(),
                "internal_addr": self.server.internal_addr.map(|a| a.to_string()),
                "command_timeout_ms": self.server.command_timeout.map(|d| d.as_millis() as u64),
            },
            "engine": {
                "pool_capacity": self.engine.pool_capacity,
                "queue_capacity": self.engine.queue_capacity.to_string(),
                "baseline_workers": self.engine.baseline_workers,
                "low_threshold": self.engine.low_threshold,
                "high_threshold": self.engine.high_threshold,
                "poll_interval_ms": self.engine.poll_interval.as_millis() as u64,
            },
            "logging": {
                "filter": self.logging.filter,
                "format": self.logging.format.to_string(),
                "service_name": self.logging.service_name,
            },
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Listen: {}", self.server.listen_addr);
        info!("  Pool capacity: {}", self.engine.pool_capacity);
        info!("  Queue capacity: {}", self.engine.queue_capacity);
        info!("  Baseline workers: {}", self.engine.baseline_workers);
        info!(
            "  Scaling thresholds: low {} / high {}",
            self.engine.low_threshold, self.engine.high_threshold
        );
        info!("  Poll interval: {:?}", self.engine.poll_interval);

        if let Some(ref internal) = self.server.internal_addr {
            info!("  Internal server: {}", internal);
        }

        match self.server.command_timeout {
            Some(timeout) => info!("  Command timeout: {:?}", timeout),
            None => info!("  Command timeout: disabled"),
        }
    }
}
