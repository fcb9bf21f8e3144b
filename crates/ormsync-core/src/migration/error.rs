//! Migration-specific error types.

use crate::adapter::AdapterError;
use crate::row::Row;
use thiserror::Error;

/// Typed reconciliation failures.
///
/// Every adapter failure aborts the reconciliation of its resource; none
/// are retried or swallowed.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The adapter could not establish or validate the connection.
    #[error("connection {connection} failed: {source}")]
    Connection {
        /// Connection name.
        connection: String,
        /// Adapter failure.
        #[source]
        source: AdapterError,
    },

    /// Introspection failed (distinct from the resource being missing).
    #[error("describe {resource} failed: {source}")]
    Describe {
        /// Resource name.
        resource: String,
        /// Adapter failure.
        #[source]
        source: AdapterError,
    },

    /// Defining the resource failed.
    #[error("define {resource} failed: {source}")]
    Define {
        /// Resource name.
        resource: String,
        /// Adapter failure.
        #[source]
        source: AdapterError,
    },

    /// Dropping the resource failed.
    #[error("drop {resource} failed: {source}")]
    Drop {
        /// Resource name.
        resource: String,
        /// Adapter failure.
        #[source]
        source: AdapterError,
    },

    /// Reading the snapshot failed. The backend was not modified.
    #[error("snapshot of {resource} failed: {source}")]
    Query {
        /// Resource name.
        resource: String,
        /// Adapter failure.
        #[source]
        source: AdapterError,
    },

    /// Re-inserting a snapshot row failed.
    #[error("restore of row {row_index} into {resource} failed: {source}")]
    Write {
        /// Resource name.
        resource: String,
        /// Position of the failing row in the snapshot.
        row_index: usize,
        /// Adapter failure.
        #[source]
        source: AdapterError,
    },

    /// Policy `safe` found no resource to use.
    #[error("schema not ready: {resource} does not exist and policy is safe")]
    SchemaNotReady {
        /// Resource name.
        resource: String,
    },

    /// A failure after the old resource was dropped.
    ///
    /// The old data is gone and the new resource is incomplete. Recovery
    /// needs manual intervention; the rows that were not restored are
    /// carried here.
    #[error(
        "DATA LOSS: {resource} was dropped but not fully restored \
         ({restored} rows restored, {} rows not restored): {source}",
        .unrestored.len()
    )]
    PostDropFailure {
        /// Resource name.
        resource: String,
        /// Rows successfully re-inserted before the failure.
        restored: usize,
        /// Snapshot rows that were not re-inserted, in snapshot order.
        unrestored: Vec<Row>,
        /// The `Define` or `Write` failure that interrupted the restore.
        #[source]
        source: Box<MigrationError>,
    },

    /// A collection definition is invalid.
    #[error("invalid collection {collection}: {source}")]
    InvalidSchema {
        /// Collection identity.
        collection: String,
        /// Validation failure.
        #[source]
        source: crate::error::Error,
    },

    /// A collection names a connection that is not configured.
    #[error("collection {collection} uses unknown connection {connection}")]
    UnknownConnection {
        /// Collection identity.
        collection: String,
        /// Connection name.
        connection: String,
    },

    /// Two collections share an identity.
    #[error("duplicate collection identity: {identity}")]
    DuplicateCollection {
        /// Collection identity.
        identity: String,
    },

    /// Two collections are bound to the same resource on one connection.
    #[error("resource {resource} on connection {connection} is claimed by more than one collection")]
    DuplicateResource {
        /// Connection name.
        connection: String,
        /// Resource name.
        resource: String,
    },
}

impl MigrationError {
    /// Check whether this failure left the backend with lost data.
    pub fn is_data_loss(&self) -> bool {
        matches!(self, MigrationError::PostDropFailure { .. })
    }

    /// The adapter failure underneath this error, if any.
    pub fn adapter_error(&self) -> Option<&AdapterError> {
        match self {
            MigrationError::Connection { source, .. }
            | MigrationError::Describe { source, .. }
            | MigrationError::Define { source, .. }
            | MigrationError::Drop { source, .. }
            | MigrationError::Query { source, .. }
            | MigrationError::Write { source, .. } => Some(source),
            MigrationError::PostDropFailure { source, .. } => source.adapter_error(),
            _ => None,
        }
    }

    /// Wrap a `Define`/`Write` failure that happened after the drop.
    pub(crate) fn post_drop(
        resource: &str,
        restored: usize,
        unrestored: Vec<Row>,
        cause: MigrationError,
    ) -> Self {
        MigrationError::PostDropFailure {
            resource: resource.to_string(),
            restored,
            unrestored,
            source: Box::new(cause),
        }
    }
}
