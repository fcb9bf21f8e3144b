//! Migration orchestrator.
//!
//! Runs the strategy engine once per declared collection at startup and
//! hands back ready collection handles only if every collection
//! reconciled.

use crate::adapter::{Adapter, AdapterError, AdapterResult, QueryOptions};
use crate::catalog::{CollectionDef, DeclaredSchema, PhysicalSchema};
use crate::config::OrchestratorConfig;
use crate::migration::{MigrationError, Reconciliation, StrategyEngine};
use crate::row::Row;
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument};

/// A collection whose backend resource is reconciled and ready to query.
#[derive(Clone)]
pub struct ReadyCollection {
    identity: String,
    connection: String,
    resource: String,
    declared: DeclaredSchema,
    reconciliation: Reconciliation,
    adapter: Arc<dyn Adapter>,
}

impl fmt::Debug for ReadyCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyCollection")
            .field("identity", &self.identity)
            .field("connection", &self.connection)
            .field("resource", &self.resource)
            .field("adapter", &self.adapter.name())
            .field("reconciliation", &self.reconciliation)
            .finish()
    }
}

impl ReadyCollection {
    /// Collection identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Connection name.
    pub fn connection(&self) -> &str {
        &self.connection
    }

    /// Backend resource name.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The finalized physical schema.
    pub fn schema(&self) -> &PhysicalSchema {
        &self.reconciliation.schema
    }

    /// The declared schema.
    pub fn declared(&self) -> &DeclaredSchema {
        &self.declared
    }

    /// What reconciliation did for this collection.
    pub fn reconciliation(&self) -> &Reconciliation {
        &self.reconciliation
    }

    /// Read rows from the bound resource.
    pub async fn find(&self, options: &QueryOptions) -> AdapterResult<Vec<Row>> {
        self.adapter
            .find(&self.connection, &self.resource, options)
            .await
    }

    /// Read the first matching row.
    pub async fn find_one(&self, options: &QueryOptions) -> AdapterResult<Option<Row>> {
        let options = options.clone().with_limit(1);
        Ok(self.find(&options).await?.into_iter().next())
    }

    /// Insert a row into the bound resource.
    pub async fn create(&self, row: Row) -> AdapterResult<Row> {
        self.adapter
            .create(&self.connection, &self.resource, row)
            .await
    }
}

/// All collections of a successful initialization, by identity.
#[derive(Debug, Clone, Default)]
pub struct Collections {
    ready: BTreeMap<String, ReadyCollection>,
}

impl Collections {
    /// Get a collection by identity (case-insensitive).
    pub fn get(&self, identity: &str) -> Option<&ReadyCollection> {
        self.ready.get(&identity.to_lowercase())
    }

    /// Iterate over ready collections in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &ReadyCollection> {
        self.ready.values()
    }

    /// Number of collections.
    pub fn len(&self) -> usize {
        self.ready.len()
    }

    /// Check if there are no collections.
    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }
}

/// One collection that failed to initialize.
#[derive(Debug)]
pub struct CollectionFailure {
    /// Collection identity.
    pub identity: String,
    /// Why it failed.
    pub error: MigrationError,
}

impl fmt::Display for CollectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.identity, self.error)
    }
}

/// Initialization failed for at least one collection.
#[derive(Debug, Error)]
#[error("initialization failed for {} collection(s): {}", .failures.len(), summarize(.failures))]
pub struct InitializationError {
    /// Every failed collection.
    pub failures: Vec<CollectionFailure>,
}

impl InitializationError {
    /// Check whether any failure left a backend with lost data.
    pub fn has_data_loss(&self) -> bool {
        self.failures.iter().any(|f| f.error.is_data_loss())
    }

    /// The failure for a collection, if it failed (case-insensitive).
    pub fn failure(&self, identity: &str) -> Option<&MigrationError> {
        let identity = identity.to_lowercase();
        self.failures
            .iter()
            .find(|f| f.identity.to_lowercase() == identity)
            .map(|f| &f.error)
    }
}

fn summarize(failures: &[CollectionFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Reconciles every declared collection at startup.
#[derive(Debug)]
pub struct Orchestrator {
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator.
    pub fn new(config: OrchestratorConfig) -> Self {
        Self { config }
    }

    /// The configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Validate definitions, register connections, and reconcile every
    /// collection.
    ///
    /// Collections reconcile concurrently; each one's adapter calls stay
    /// strictly sequential. Any failure fails the whole initialization.
    #[instrument(skip_all, fields(collections = self.config.collections.len()))]
    pub async fn initialize(&self) -> Result<Collections, InitializationError> {
        let failures = self.validate();
        if !failures.is_empty() {
            return Err(fail(failures));
        }

        let failed_connections = self.register_connections().await;

        let mut failures = Vec::new();
        let mut pending = Vec::new();
        for def in &self.config.collections {
            match failed_connections.get(&def.connection) {
                Some(source) => failures.push(CollectionFailure {
                    identity: def.identity.clone(),
                    error: MigrationError::Connection {
                        connection: def.connection.clone(),
                        source: source.clone(),
                    },
                }),
                None => pending.push(def),
            }
        }

        let results = join_all(pending.into_iter().map(|def| self.reconcile(def))).await;

        let mut ready = BTreeMap::new();
        for result in results {
            match result {
                Ok(collection) => {
                    ready.insert(collection.identity.to_lowercase(), collection);
                }
                Err(failure) => failures.push(failure),
            }
        }

        if !failures.is_empty() {
            return Err(fail(failures));
        }

        info!(collections = ready.len(), "all collections ready");
        Ok(Collections { ready })
    }

    /// Check definitions before any adapter call.
    fn validate(&self) -> Vec<CollectionFailure> {
        let mut failures = Vec::new();
        let mut identities = HashSet::new();
        let mut resources = HashSet::new();

        for def in &self.config.collections {
            let failure = |error| CollectionFailure {
                identity: def.identity.clone(),
                error,
            };

            if let Err(source) = def.validate() {
                failures.push(failure(MigrationError::InvalidSchema {
                    collection: def.identity.clone(),
                    source,
                }));
                continue;
            }
            if !self.config.connections.contains_key(&def.connection) {
                failures.push(failure(MigrationError::UnknownConnection {
                    collection: def.identity.clone(),
                    connection: def.connection.clone(),
                }));
                continue;
            }
            if !identities.insert(def.identity.to_lowercase()) {
                failures.push(failure(MigrationError::DuplicateCollection {
                    identity: def.identity.clone(),
                }));
                continue;
            }
            let resource = def.resource_name();
            if !resources.insert((def.connection.clone(), resource.clone())) {
                failures.push(failure(MigrationError::DuplicateResource {
                    connection: def.connection.clone(),
                    resource,
                }));
            }
        }

        failures
    }

    /// Register each connection used by a collection, once.
    ///
    /// Returns the connections that failed, with their errors.
    async fn register_connections(&self) -> BTreeMap<String, AdapterError> {
        let used: BTreeSet<&str> = self
            .config
            .collections
            .iter()
            .map(|def| def.connection.as_str())
            .collect();

        let mut failed = BTreeMap::new();
        for name in used {
            let Some(entry) = self.config.connections.get(name) else {
                continue;
            };
            if let Err(err) = entry.adapter.register_connection(name, &entry.config).await {
                error!(connection = name, error = %err, "connection registration failed");
                failed.insert(name.to_string(), err);
            }
        }
        failed
    }

    async fn reconcile(&self, def: &CollectionDef) -> Result<ReadyCollection, CollectionFailure> {
        let failure = |error| CollectionFailure {
            identity: def.identity.clone(),
            error,
        };

        let entry = self
            .config
            .connections
            .get(&def.connection)
            .ok_or_else(|| {
                failure(MigrationError::UnknownConnection {
                    collection: def.identity.clone(),
                    connection: def.connection.clone(),
                })
            })?;

        let engine = StrategyEngine::new(entry.adapter.as_ref(), &def.connection);
        match engine.reconcile_collection(def, &self.config.migration).await {
            Ok(reconciliation) => Ok(ReadyCollection {
                identity: def.identity.clone(),
                connection: def.connection.clone(),
                resource: reconciliation.resource.clone(),
                declared: def.attributes.clone(),
                reconciliation,
                adapter: Arc::clone(&entry.adapter),
            }),
            Err(err) => {
                if err.is_data_loss() {
                    error!(collection = %def.identity, error = %err, "collection lost data during migration");
                } else {
                    error!(collection = %def.identity, error = %err, "collection failed to reconcile");
                }
                Err(failure(err))
            }
        }
    }
}

fn fail(failures: Vec<CollectionFailure>) -> InitializationError {
    InitializationError { failures }
}
