//! Orchestrator configuration.

use crate::adapter::{Adapter, ConnectionConfig};
use crate::catalog::CollectionDef;
use crate::error::Error;
use crate::migration::MigrationConfig;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// An adapter instance paired with the options for one connection.
#[derive(Clone)]
pub struct ConnectionEntry {
    /// Adapter serving the connection.
    pub adapter: Arc<dyn Adapter>,
    /// Options passed to `register_connection`.
    pub config: ConnectionConfig,
}

impl fmt::Debug for ConnectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEntry")
            .field("adapter", &self.adapter.name())
            .field("config", &self.config)
            .finish()
    }
}

/// Everything the orchestrator needs: named connections, the collections
/// declared on them, and engine settings.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Connection name to adapter and options.
    pub connections: BTreeMap<String, ConnectionEntry>,
    /// Declared collections, in declaration order.
    pub collections: Vec<CollectionDef>,
    /// Migration engine settings.
    pub migration: MigrationConfig,
}

impl OrchestratorConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named connection.
    pub fn with_connection(
        mut self,
        name: impl Into<String>,
        adapter: Arc<dyn Adapter>,
        config: ConnectionConfig,
    ) -> Self {
        self.connections
            .insert(name.into(), ConnectionEntry { adapter, config });
        self
    }

    /// Add a collection.
    pub fn with_collection(mut self, def: CollectionDef) -> Self {
        self.collections.push(def);
        self
    }

    /// Add several collections.
    pub fn with_collections(mut self, defs: impl IntoIterator<Item = CollectionDef>) -> Self {
        self.collections.extend(defs);
        self
    }

    /// Set the migration engine settings.
    pub fn with_migration(mut self, migration: MigrationConfig) -> Self {
        self.migration = migration;
        self
    }
}

/// Parse collection definitions from a JSON array.
pub fn collections_from_json(json: &str) -> Result<Vec<CollectionDef>, Error> {
    let defs: Vec<CollectionDef> = serde_json::from_str(json)?;
    for def in &defs {
        def.validate()?;
    }
    Ok(defs)
}

/// Load collection definitions from a JSON file.
pub fn load_collections(path: impl AsRef<Path>) -> Result<Vec<CollectionDef>, Error> {
    let json = std::fs::read_to_string(path)?;
    collections_from_json(&json)
}
