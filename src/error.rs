//! Error types for the rhizome library.
//!
//! This module provides the error hierarchy shared by the storage adapters,
//! the replication transport and node configuration.

use std::io;
use thiserror::Error;

/// Primary error type encompassing all possible errors in the library.
#[derive(Error, Debug)]
pub enum Error {
    /// Engine errors, including rejected statements
    #[error("Database error: {0}")]
    Database(#[from] crate::database::Error),

    /// Inter-node HTTP errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Input/output operation errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Message serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration validation and parsing errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal library errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Network-specific error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The peer did not answer within the call's timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection refused, reset, DNS failure or any other transport failure
    #[error("Peer unreachable: {0}")]
    Unreachable(String),

    /// The peer answered with a non-success status
    #[error("Unexpected status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, or the canonical reason when empty
        message: String,
    },

    /// The peer's response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// A peer address that is not an http(s) base URL
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout(err.to_string())
        } else if err.is_builder() {
            NetworkError::InvalidAddress(err.to_string())
        } else if err.is_decode() {
            NetworkError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            NetworkError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            NetworkError::Unreachable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new network error with the given message.
    pub fn network(msg: impl Into<String>) -> Self {
        Error::Network(NetworkError::Unreachable(msg.into()))
    }

    /// Creates a new configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}
