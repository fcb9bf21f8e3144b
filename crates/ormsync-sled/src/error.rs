//! Error types for the sled adapter.

use ormsync_core::AdapterError;
use thiserror::Error;

/// Errors raised by the sled adapter.
#[derive(Debug, Error)]
pub enum SledError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Row or schema encoding error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Connection options are unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Connection was never registered.
    #[error("unknown connection: {0}")]
    UnknownConnection(String),

    /// Resource does not exist.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// A row with the same primary key already exists.
    #[error("duplicate primary key {key} in {resource}")]
    DuplicateKey {
        /// Resource name.
        resource: String,
        /// Offending key, JSON encoded.
        key: String,
    },
}

impl From<SledError> for AdapterError {
    fn from(err: SledError) -> Self {
        match err {
            SledError::Storage(e) => AdapterError::Backend(e.to_string()),
            SledError::Serialization(e) => AdapterError::Serialization(e.to_string()),
            SledError::Config(message) => AdapterError::Connection { message },
            SledError::UnknownConnection(connection) => {
                AdapterError::UnknownConnection { connection }
            }
            SledError::ResourceNotFound(resource) => AdapterError::NotFound { resource },
            err @ SledError::DuplicateKey { .. } => AdapterError::Constraint {
                message: err.to_string(),
            },
        }
    }
}
