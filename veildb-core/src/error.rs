//! Error types for veildb-core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Encoded attribute value could not be decoded
    #[error("Corrupt encoded value: {0}")]
    CorruptValue(String),

    /// Attribute value rejected before encoding (e.g. malformed number text)
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Table schema is unusable (no partition key, describe failed)
    #[error("Invalid schema: {0}")]
    SchemaInvalid(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conditional write was rejected by the store
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Operation deadline elapsed or the caller cancelled
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Any other error from the underlying store, preserved as text
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Create a corrupt-value error
    pub fn corrupt_value(msg: impl Into<String>) -> Self {
        Error::CorruptValue(msg.into())
    }

    /// Create an invalid-value error
    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Error::InvalidValue(msg.into())
    }

    /// Create an invalid-schema error
    pub fn schema_invalid(msg: impl Into<String>) -> Self {
        Error::SchemaInvalid(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create a precondition-failed error
    pub fn precondition_failed(msg: impl Into<String>) -> Self {
        Error::PreconditionFailed(msg.into())
    }

    /// Create a cancelled error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Error::Cancelled(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }
}
