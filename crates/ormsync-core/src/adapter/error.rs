//! Adapter contract errors.

use thiserror::Error;

/// Errors reported across the adapter contract.
///
/// Adapters never panic or unwind across the contract; every failure is
/// returned as one of these variants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    /// The resource does not exist.
    #[error("resource not found: {resource}")]
    NotFound {
        /// Resource name.
        resource: String,
    },

    /// The connection was never registered with this adapter.
    #[error("unknown connection: {connection}")]
    UnknownConnection {
        /// Connection name.
        connection: String,
    },

    /// The backend could not establish or validate a connection.
    #[error("connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// The adapter does not implement this operation.
    #[error("operation not supported: {operation}")]
    Unsupported {
        /// Operation name.
        operation: &'static str,
    },

    /// A write violated a backend constraint.
    #[error("constraint violation: {message}")]
    Constraint {
        /// Error message.
        message: String,
    },

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl AdapterError {
    /// Check whether this error reports an absent resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AdapterError::NotFound { .. })
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Serialization(err.to_string())
    }
}

/// Result type for adapter calls.
pub type AdapterResult<T> = Result<T, AdapterError>;
