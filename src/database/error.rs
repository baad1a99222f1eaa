use std::error::Error as StdError;
use std::fmt;

/// Database error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Connection error
    Connection(String),
    /// Query error reported by the engine
    Query(String),
    /// Configuration error
    Config(String),
    /// A database or table name that is not a plain identifier
    InvalidIdentifier(String),
    /// A statement refused by the statement guard
    RejectedStatement(String),
}

impl Error {
    /// Whether the error was caused by the caller's input rather than the engine.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidIdentifier(_) | Error::RejectedStatement(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(msg) => write!(f, "Connection error: {}", msg),
            Error::Query(msg) => write!(f, "{}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::InvalidIdentifier(name) => write!(f, "Invalid identifier: {:?}", name),
            Error::RejectedStatement(msg) => write!(f, "Statement rejected: {}", msg),
        }
    }
}

impl StdError for Error {}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Query(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for Error {
    fn from(err: tokio_postgres::Error) -> Self {
        Error::Query(err.to_string())
    }
}

/// Result type for database operations
pub type Result<T> = std::result::Result<T, Error>;
