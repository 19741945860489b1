//! Typed error definitions for the sync pipeline.
//!
//! Provides [`SyncError`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement `std::error::Error`
//! via `thiserror`, so they integrate seamlessly with `anyhow::Result`.

use thiserror::Error;

/// Domain-specific errors for the sync pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration parsing or validation error. Fatal at startup only.
    #[error("config error: {0}")]
    Config(String),

    /// Cache connection or command error.
    #[error("cache error: {0}")]
    Cache(String),

    /// Upstream feed or manual store fetch error.
    #[error("source error: {0}")]
    Source(String),

    /// Pub/sub publish error.
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON encode/decode error for a cached or published value.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for SyncError {
    fn from(e: redis::RedisError) -> Self {
        Self::Cache(e.to_string())
    }
}

/// Convenience alias used across the core crate.
pub type SyncResult<T> = Result<T, SyncError>;
