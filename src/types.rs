//! Core error and result types

use thiserror::Error;

/// Errors surfaced by the processing core
///
/// Storage, cache, and queue failures are contained at the component boundary
/// that caused them (one flush group, one page, one job run) and logged;
/// only `Config` is fatal to a process.
#[derive(Debug, Error)]
pub enum UndercurrentError {
    /// MongoDB operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Cache operation failed
    #[error("Cache error: {0}")]
    Cache(String),

    /// NATS / queue operation failed
    #[error("Queue error: {0}")]
    Queue(String),

    /// Cron registration or trigger failure
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Missing or invalid startup configuration (fatal)
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, UndercurrentError>;
