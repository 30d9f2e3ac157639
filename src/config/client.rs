//! Load client configuration.

use std::net::SocketAddr;
use std::time::Duration;

use super::parse::{env_duration, env_or, env_parse};
use super::ConfigError;

/// Configuration of the `job_client` load generator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Command server to hit (default: 127.0.0.1:9898).
    pub server_addr: SocketAddr,
    /// Fewest clients a run may start.
    pub min_clients: usize,
    /// Most clients a run may start.
    pub max_clients: usize,
    /// Shortest delay before a client sends its first command.
    pub min_delay: Duration,
    /// Longest delay before a client sends its first command.
    pub max_delay: Duration,
    /// Commands each client sends, one connection per command.
    pub commands_per_client: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 9898)),
            min_clients: 10,
            max_clients: 500,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            commands_per_client: 1,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = env_or("SERVER_ADDR", "127.0.0.1:9898");
        let server_addr: SocketAddr = raw.parse().map_err(|e| ConfigError::Parse {
            key: "SERVER_ADDR".into(),
            value: raw.clone(),
            error: format!("{}", e),
        })?;

        let config = Self {
            server_addr,
            min_clients: env_parse("CLIENT_MIN", 10)?,
            max_clients: env_parse("CLIENT_MAX", 500)?,
            // "0" and "off" both mean no delay
            min_delay: env_duration("DELAY_MIN", "100ms")?.unwrap_or_default(),
            max_delay: env_duration("DELAY_MAX", "5s")?.unwrap_or_default(),
            commands_per_client: env_parse("COMMANDS_PER_CLIENT", 1)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that both ranges are non-empty and something will be sent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clients == 0 {
            return Err(ConfigError::invalid("CLIENT_MAX", "must be at least 1"));
        }
        if self.min_clients > self.max_clients {
            return Err(ConfigError::invalid(
                "CLIENT_MIN",
                format!(
                    "{} exceeds CLIENT_MAX ({})",
                    self.min_clients, self.max_clients
                ),
            ));
        }
        if self.min_delay > self.max_delay {
            return Err(ConfigError::invalid(
                "DELAY_MIN",
                format!("{:?} exceeds DELAY_MAX ({:?})", self.min_delay, self.max_delay),
            ));
        }
        if self.commands_per_client == 0 {
            return Err(ConfigError::invalid(
                "COMMANDS_PER_CLIENT",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
