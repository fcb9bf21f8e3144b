//! Adapter implementation.

use crate::config::SledConfig;
use crate::error::SledError;
use async_trait::async_trait;
use ormsync_core::adapter::key_is_generated;
use ormsync_core::{
    Adapter, AdapterError, AdapterResult, ConnectionConfig, DeclaredSchema, PhysicalSchema,
    QueryOptions, Row, Value,
};
use parking_lot::RwLock;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::collections::HashMap;
use tracing::{debug, info};

/// Tree name for resource schemas (resource -> JSON schema).
const SCHEMA_TREE: &str = "schema";

/// Tree name for generated key sequences (resource -> next key).
const SEQUENCE_TREE: &str = "sequence";

/// Prefix for per-resource row trees (row id -> JSON row).
const ROWS_PREFIX: &str = "rows:";

/// Prefix for per-resource primary key indexes (JSON key -> row id).
const KEYS_PREFIX: &str = "keys:";

/// Storage adapter backed by embedded sled databases.
#[derive(Default)]
pub struct SledAdapter {
    connections: RwLock<HashMap<String, Db>>,
}

impl SledAdapter {
    /// Create an adapter with no connections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flush a connection's pending writes to disk.
    pub async fn flush(&self, connection: &str) -> Result<(), SledError> {
        let db = self.db(connection)?;
        db.flush_async().await?;
        Ok(())
    }

    fn db(&self, connection: &str) -> Result<Db, SledError> {
        self.connections
            .read()
            .get(connection)
            .cloned()
            .ok_or_else(|| SledError::UnknownConnection(connection.to_string()))
    }

    fn open(&self, connection: &str) -> Result<Store, SledError> {
        let db = self.db(connection)?;
        let schemas = db.open_tree(SCHEMA_TREE)?;
        let sequences = db.open_tree(SEQUENCE_TREE)?;
        Ok(Store {
            db,
            schemas,
            sequences,
        })
    }
}

/// Trees of one connection.
struct Store {
    db: Db,
    schemas: Tree,
    sequences: Tree,
}

impl Store {
    fn schema(&self, resource: &str) -> Result<Option<PhysicalSchema>, SledError> {
        match self.schemas.get(resource)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn existing_schema(&self, resource: &str) -> Result<PhysicalSchema, SledError> {
        self.schema(resource)?
            .ok_or_else(|| SledError::ResourceNotFound(resource.to_string()))
    }

    fn rows(&self, resource: &str) -> Result<Tree, SledError> {
        Ok(self.db.open_tree(format!("{ROWS_PREFIX}{resource}"))?)
    }

    fn keys(&self, resource: &str) -> Result<Tree, SledError> {
        Ok(self.db.open_tree(format!("{KEYS_PREFIX}{resource}"))?)
    }

    fn define(&self, resource: &str, schema: &PhysicalSchema) -> Result<(), SledError> {
        self.schemas.insert(resource, serde_json::to_vec(schema)?)?;
        self.rows(resource)?;
        self.keys(resource)?;
        Ok(())
    }

    fn scan(&self, resource: &str) -> Result<Vec<Row>, SledError> {
        self.rows(resource)?
            .iter()
            .values()
            .map(|value| -> Result<Row, SledError> { Ok(serde_json::from_slice(&value?)?) })
            .collect()
    }

    /// Insert a row, assigning a generated key when needed.
    ///
    /// The uniqueness check, the sequence update and both writes commit in
    /// one transaction over the row, key and sequence trees.
    fn insert(
        &self,
        resource: &str,
        schema: &PhysicalSchema,
        row: Row,
    ) -> Result<Row, SledError> {
        let rows = self.rows(resource)?;
        let keys = self.keys(resource)?;
        let primary_key = schema.primary_key();
        let generated = key_is_generated(schema);
        let id = self.db.generate_id()?.to_be_bytes();

        let result: Result<Row, TransactionError<SledError>> = (&rows, &keys, &self.sequences)
            .transaction(|(rows_tx, keys_tx, seq_tx)| {
                let mut row = row.clone();
                let next = seq_tx
                    .get(resource)?
                    .as_deref()
                    .map(decode_key)
                    .unwrap_or(1);

                match row.get(primary_key) {
                    Some(value) => {
                        if keys_tx.get(encode(value)?)?.is_some() {
                            return Err(ConflictableTransactionError::Abort(
                                SledError::DuplicateKey {
                                    resource: resource.to_string(),
                                    key: value.to_string(),
                                },
                            ));
                        }
                        if let Some(key) = value.as_i64() {
                            let next = next.max(key.saturating_add(1));
                            seq_tx.insert(resource.as_bytes(), &next.to_be_bytes()[..])?;
                        }
                    }
                    None if generated => {
                        let after = next.saturating_add(1).to_be_bytes();
                        seq_tx.insert(resource.as_bytes(), &after[..])?;
                        row.insert(primary_key.to_string(), Value::from(next));
                    }
                    None => {}
                }

                rows_tx.insert(&id[..], encode(&row)?)?;
                if let Some(value) = row.get(primary_key) {
                    keys_tx.insert(encode(value)?, &id[..])?;
                }
                Ok(row)
            });

        match result {
            Ok(row) => Ok(row),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(SledError::Storage(e)),
        }
    }

    /// Remove every trace of a resource. Returns false if it did not exist.
    ///
    /// Data trees go first; the schema entry is removed last so a failed
    /// drop leaves the resource visible.
    fn remove(&self, resource: &str) -> Result<bool, SledError> {
        let existed = self.schemas.contains_key(resource)?;
        self.db.drop_tree(format!("{ROWS_PREFIX}{resource}"))?;
        self.db.drop_tree(format!("{KEYS_PREFIX}{resource}"))?;
        self.sequences.remove(resource)?;
        self.schemas.remove(resource)?;
        Ok(existed)
    }
}

/// JSON-encode a value inside a transaction.
fn encode<T: serde::Serialize + ?Sized>(
    value: &T,
) -> Result<Vec<u8>, ConflictableTransactionError<SledError>> {
    serde_json::to_vec(value).map_err(|e| ConflictableTransactionError::Abort(e.into()))
}

fn decode_key(bytes: &[u8]) -> i64 {
    <[u8; 8]>::try_from(bytes)
        .map(i64::from_be_bytes)
        .unwrap_or(1)
}

#[async_trait]
impl Adapter for SledAdapter {
    fn name(&self) -> &str {
        "sled"
    }

    async fn register_connection(
        &self,
        connection: &str,
        config: &ConnectionConfig,
    ) -> AdapterResult<()> {
        if self.connections.read().contains_key(connection) {
            return Ok(());
        }

        let sled_config = SledConfig::from_connection(config)?;
        let db = sled_config
            .to_sled_config()
            .open()
            .map_err(|e| AdapterError::Connection {
                message: format!("cannot open {}: {e}", sled_config.path.display()),
            })?;

        info!(
            connection,
            path = %sled_config.path.display(),
            recovered = db.was_recovered(),
            "sled connection registered"
        );
        self.connections
            .write()
            .entry(connection.to_string())
            .or_insert(db);
        Ok(())
    }

    async fn describe(
        &self,
        connection: &str,
        resource: &str,
    ) -> AdapterResult<Option<PhysicalSchema>> {
        Ok(self.open(connection)?.schema(resource)?)
    }

    async fn define(
        &self,
        connection: &str,
        resource: &str,
        schema: &DeclaredSchema,
    ) -> AdapterResult<PhysicalSchema> {
        let physical = PhysicalSchema::from_declared(schema);
        self.open(connection)?.define(resource, &physical)?;
        debug!(connection, resource, "resource defined");
        Ok(physical)
    }

    async fn find(
        &self,
        connection: &str,
        resource: &str,
        options: &QueryOptions,
    ) -> AdapterResult<Vec<Row>> {
        let store = self.open(connection)?;
        let schema = store.existing_schema(resource)?;
        let rows = store.scan(resource)?;
        Ok(options.apply(rows, schema.primary_key()))
    }

    async fn create(&self, connection: &str, resource: &str, row: Row) -> AdapterResult<Row> {
        let store = self.open(connection)?;
        let schema = store.existing_schema(resource)?;
        Ok(store.insert(resource, &schema, row)?)
    }

    async fn drop_resource(
        &self,
        connection: &str,
        resource: &str,
        relations: &[String],
    ) -> AdapterResult<()> {
        let store = self.open(connection)?;
        if !store.remove(resource)? {
            return Err(AdapterError::NotFound {
                resource: resource.to_string(),
            });
        }
        for relation in relations {
            store.remove(relation)?;
        }
        debug!(connection, resource, relations = relations.len(), "resource dropped");
        Ok(())
    }
}
