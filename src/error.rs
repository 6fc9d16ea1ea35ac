use std::sync::PoisonError;

use bincode::ErrorKind;
use thiserror::Error;

/// Custom Result type for tinyorm operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for tinyorm
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed request built by the caller (bad join spec, missing key, ...)
    #[error("construction error: {0}")]
    Construction(String),

    /// Statement failed at execution time; the transaction was rolled back
    #[error("execution error: {0}")]
    Execution(String),

    /// SQL parsing error
    #[error("parse error: {0}")]
    Parse(String),

    /// Internal error (storage, serialization, etc.)
    #[error("internal error: {0}")]
    Internal(String),

    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn construction(msg: impl Into<String>) -> Self {
        Error::Construction(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Error::Execution(msg.into())
    }

    /// Wraps a backend failure as an execution error, keeping caller-side
    /// construction errors as they are.
    pub fn into_execution(self) -> Self {
        match self {
            Error::Construction(_) | Error::Execution(_) => self,
            other => Error::Execution(other.to_string()),
        }
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(value: std::num::ParseIntError) -> Self {
        Error::Parse(value.to_string())
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(value: std::num::ParseFloatError) -> Self {
        Error::Parse(value.to_string())
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(value: PoisonError<T>) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<Box<ErrorKind>> for Error {
    fn from(value: Box<ErrorKind>) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(value: config::ConfigError) -> Self {
        Error::Config(value.to_string())
    }
}
