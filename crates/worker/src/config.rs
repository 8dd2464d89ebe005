//! Worker configuration loaded from environment variables.

use std::net::SocketAddr;
use std::str::FromStr;

use message_bus::BusConfig;
use transaction::RetryPolicy;

use crate::error::ConfigError;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::InvalidLogFormat(s.to_string())),
        }
    }
}

/// Worker configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `EVENT_QUEUE_CAPACITY`: bounded queue capacity, at least 1 (default: `100`)
/// - `DATABASE_URL`: PostgreSQL URL; in-memory database when unset
/// - `METRICS_ADDR`: Prometheus listener address (default: `"0.0.0.0:9000"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `TRANSACTION_MAX_RETRIES`: retries on transient failures (default: `3`)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bus: BusConfig,
    pub database_url: Option<String>,
    pub metrics_addr: SocketAddr,
    pub log_format: LogFormat,
    pub log_level: String,
    pub max_retries: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bus = match lookup("EVENT_QUEUE_CAPACITY") {
            Some(raw) => parse_capacity(&raw)?,
            None => defaults.bus,
        };

        let metrics_addr = match lookup("METRICS_ADDR") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidMetricsAddr(raw))?,
            None => defaults.metrics_addr,
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => defaults.log_format,
        };

        let max_retries = match lookup("TRANSACTION_MAX_RETRIES") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidMaxRetries(raw))?,
            None => defaults.max_retries,
        };

        Ok(Self {
            bus,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            metrics_addr,
            log_format,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            max_retries,
        })
    }

    /// Returns the retry policy for command transactions.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_retries(self.max_retries)
    }
}

fn parse_capacity(raw: &str) -> Result<BusConfig, ConfigError> {
    let capacity: usize = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidQueueCapacity(raw.to_string()))?;
    BusConfig::new(capacity).map_err(|_| ConfigError::InvalidQueueCapacity(raw.to_string()))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            database_url: None,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9000)),
            log_format: LogFormat::Pretty,
            log_level: "info".to_string(),
            max_retries: 3,
        }
    }
}
