//! Logging configuration.

use std::fmt;

use super::parse::env_or;
use super::ConfigError;

/// Output format for log lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable `tracing_subscriber::fmt` output.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Logging configuration loaded from environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level filter (from LOG_LEVEL or RUST_LOG).
    pub filter: String,
    /// Line format (from LOG_FORMAT).
    pub format: LogFormat,
    /// Service name for structured logging.
    pub service_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "job_server=info".to_string(),
            format: LogFormat::Text,
            service_name: "job_server".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Load configuration from environment variables.
    ///
    /// LOG_LEVEL accepts simple values: trace, debug, info, warn, error
    /// RUST_LOG accepts full tracing filter syntax: job_server=debug,hyper=warn
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            filter: Self::resolve_log_filter(),
            format: Self::parse_format()?,
            service_name: env_or("SERVICE_NAME", "job_server"),
        })
    }

    fn parse_format() -> Result<LogFormat, ConfigError> {
        let raw = env_or("LOG_FORMAT", "text");
        match raw.trim().to_lowercase().as_str() {
            "text" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::invalid(
                "LOG_FORMAT",
                format!("'{}', expected: text, json", raw),
            )),
        }
    }

    /// Resolve log filter from environment.
    ///
    /// Priority: LOG_LEVEL > RUST_LOG > default (info)
    fn resolve_log_filter() -> String {
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            let level = level.to_lowercase();
            match level.as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => {
                    return format!("job_server={}", level);
                }
                _ => {
                    // Logging is not up yet
                    eprintln!(
                        "Warning: Invalid LOG_LEVEL '{}', expected: trace, debug, info, warn, error",
                        level
                    );
                }
            }
        }

        if let Ok(filter) = std::env::var("RUST_LOG") {
            return filter;
        }

        "job_server=info".to_string()
    }
}
