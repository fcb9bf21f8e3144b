//! Core error types.

use thiserror::Error;

/// Errors raised while loading or validating definitions.
#[derive(Debug, Error)]
pub enum Error {
    /// A schema or collection definition violates an invariant.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// JSON decoding error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error while reading a definition file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
