//! Error types for orderpulse-core
//!
//! Each subsystem gets its own error enum. None of them are fatal to the hub:
//! the hub logs and counts store failures, producers return theirs to the
//! orchestrator, and auth failures are turned into HTTP rejections.

use thiserror::Error;

/// Durable log errors
#[derive(Debug, Error)]
pub enum LogError {
    /// Filesystem error (open, rename, write, metadata)
    #[error("log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized
    #[error("log serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backing path is not usable
    #[error("log path unavailable: {0}")]
    Unavailable(String),
}

/// Producer (generator / broker consumer) errors
#[derive(Debug, Error)]
pub enum ProducerError {
    /// Broker connection or read failure
    #[error("broker error: {0}")]
    Broker(String),

    /// Message payload could not be decoded into an order event
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Cancellation signal fired while the producer was running
    #[error("producer cancelled")]
    Cancelled,
}

impl From<redis::RedisError> for ProducerError {
    fn from(err: redis::RedisError) -> Self {
        ProducerError::Broker(err.to_string())
    }
}

/// Token validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No token presented
    #[error("missing token")]
    MissingToken,

    /// Token is malformed or its signature does not verify
    #[error("invalid token")]
    InvalidToken,

    /// Signing key id not configured
    #[error("unknown key id: {0}")]
    UnknownKey(String),

    /// `exp` claim is in the past
    #[error("token expired")]
    Expired,

    /// `nbf` claim is in the future
    #[error("token not yet valid")]
    NotYetValid,

    /// `iat` claim is in the future
    #[error("token issued in the future")]
    IssuedInFuture,
}

/// Result alias for durable log operations
pub type LogResult<T> = std::result::Result<T, LogError>;

/// Result alias for producer operations
pub type ProducerResult<T> = std::result::Result<T, ProducerError>;
