//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use super::parse::{env_duration, env_opt, env_or};
use super::ConfigError;

/// Server configuration loaded from environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Command listener address (default: 0.0.0.0:9898).
    pub listen_addr: SocketAddr,
    /// Internal server address for /health, /metrics and /config.
    pub internal_addr: Option<SocketAddr>,
    /// How long a client may take to send its command line.
    pub command_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 9898)),
            internal_addr: None,
            command_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = env_or("LISTEN_ADDR", "0.0.0.0:9898");
        let listen_addr: SocketAddr = raw.parse().map_err(|e| ConfigError::Parse {
            key: "LISTEN_ADDR".into(),
            value: raw.clone(),
            error: format!("{}", e),
        })?;

        let internal_addr = env_opt("INTERNAL_ADDR")
            .map(|s| {
                s.parse::<SocketAddr>().map_err(|e| ConfigError::Parse {
                    key: "INTERNAL_ADDR".into(),
                    value: s,
                    error: format!("{}", e),
                })
            })
            .transpose()?;

        Ok(Self {
            listen_addr,
            internal_addr,
            command_timeout: env_duration("COMMAND_TIMEOUT", "30s")?,
        })
    }
}
