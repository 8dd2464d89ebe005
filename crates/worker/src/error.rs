//! Worker error types.

use message_bus::QueueError;
use thiserror::Error;
use transaction::TransactionError;

/// Invalid configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("EVENT_QUEUE_CAPACITY must be an integer of at least 1, got {0:?}")]
    InvalidQueueCapacity(String),

    #[error("METRICS_ADDR must be a socket address, got {0:?}")]
    InvalidMetricsAddr(String),

    #[error("LOG_FORMAT must be \"pretty\" or \"json\", got {0:?}")]
    InvalidLogFormat(String),

    #[error("TRANSACTION_MAX_RETRIES must be a non-negative integer, got {0:?}")]
    InvalidMaxRetries(String),
}

/// Errors that stop the worker process.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Event queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Database error: {0}")]
    Database(#[from] TransactionError),

    #[error("Failed to install metrics exporter: {0}")]
    Metrics(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Event processor task failed: {0}")]
    Processor(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
