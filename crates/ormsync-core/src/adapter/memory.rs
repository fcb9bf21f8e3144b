//! In-memory adapter.
//!
//! A schemaless, process-local backend. Rows are stored exactly as given
//! (plus any generated key), so rows that carry undeclared attributes
//! survive here the way they would in a document store.
//!
//! Every contract call is recorded in a journal, and one-shot faults can
//! be scheduled per operation. Both exist so the migration engine's call
//! ordering and failure handling can be observed without a real backend.

use super::{
    key_is_generated, Adapter, AdapterError, AdapterOperation, AdapterResult, Capabilities,
    ConnectionConfig, QueryOptions,
};
use crate::catalog::{DeclaredSchema, PhysicalSchema};
use crate::row::{Row, Value};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// Operation invoked.
    pub operation: AdapterOperation,
    /// Connection name.
    pub connection: String,
    /// Resource name (`None` for connection registration).
    pub resource: Option<String>,
}

/// A scheduled failure.
#[derive(Debug, Clone)]
struct Fault {
    operation: AdapterOperation,
    /// Successful calls of `operation` to let through before failing.
    skip: usize,
    error: AdapterError,
}

#[derive(Debug, Default)]
struct MemoryResource {
    schema: PhysicalSchema,
    rows: Vec<Row>,
    next_key: i64,
}

impl MemoryResource {
    fn new(schema: PhysicalSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            next_key: 1,
        }
    }

    fn observe_key(&mut self, value: &Value) {
        if let Some(key) = value.as_i64() {
            self.next_key = self.next_key.max(key.saturating_add(1));
        }
    }

    fn insert(&mut self, mut row: Row) -> AdapterResult<Row> {
        let primary_key = self.schema.primary_key().to_string();

        match row.get(&primary_key) {
            Some(value) => {
                if self.rows.iter().any(|r| r.get(&primary_key) == Some(value)) {
                    return Err(AdapterError::Constraint {
                        message: format!("duplicate {primary_key}: {value}"),
                    });
                }
                self.observe_key(value);
            }
            None if key_is_generated(&self.schema) => {
                let key = self.next_key;
                self.next_key += 1;
                row.insert(primary_key, Value::from(key));
            }
            None => {}
        }

        self.rows.push(row.clone());
        Ok(row)
    }
}

#[derive(Debug, Default)]
struct MemoryConnection {
    registered: bool,
    config: ConnectionConfig,
    resources: HashMap<String, MemoryResource>,
}

#[derive(Debug, Default)]
struct MemoryState {
    connections: HashMap<String, MemoryConnection>,
    journal: Vec<JournalEntry>,
    faults: Vec<Fault>,
}

impl MemoryState {
    fn record(&mut self, operation: AdapterOperation, connection: &str, resource: Option<&str>) {
        self.journal.push(JournalEntry {
            operation,
            connection: connection.to_string(),
            resource: resource.map(str::to_string),
        });
    }

    /// Consume a scheduled fault for this call, if one is due.
    fn take_fault(&mut self, operation: AdapterOperation) -> AdapterResult<()> {
        let Some(idx) = self.faults.iter().position(|f| f.operation == operation) else {
            return Ok(());
        };

        if self.faults[idx].skip > 0 {
            self.faults[idx].skip -= 1;
            return Ok(());
        }

        Err(self.faults.remove(idx).error)
    }

    /// Journal the call, apply faults, and resolve a registered connection.
    fn enter(
        &mut self,
        operation: AdapterOperation,
        connection: &str,
        resource: &str,
    ) -> AdapterResult<&mut MemoryConnection> {
        self.record(operation, connection, Some(resource));
        self.take_fault(operation)?;

        match self.connections.get_mut(connection) {
            Some(conn) if conn.registered => Ok(conn),
            _ => Err(AdapterError::UnknownConnection {
                connection: connection.to_string(),
            }),
        }
    }
}

/// In-memory adapter.
#[derive(Debug)]
pub struct MemoryAdapter {
    capabilities: Capabilities,
    state: Mutex<MemoryState>,
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAdapter {
    /// Create an empty adapter.
    pub fn new() -> Self {
        Self {
            capabilities: Capabilities::default(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Create an adapter whose `describe` cannot see existing resources.
    pub fn without_introspection() -> Self {
        Self {
            capabilities: Capabilities {
                introspection: false,
            },
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Place a resource with existing rows, bypassing the journal.
    ///
    /// The connection still has to be registered before it can be used.
    pub fn seed(&self, connection: &str, resource: &str, schema: PhysicalSchema, rows: Vec<Row>) {
        let mut state = self.state.lock();
        let conn = state.connections.entry(connection.to_string()).or_default();

        let mut seeded = MemoryResource::new(schema);
        for row in &rows {
            if let Some(value) = row.get(seeded.schema.primary_key()) {
                seeded.observe_key(value);
            }
        }
        seeded.rows = rows;
        conn.resources.insert(resource.to_string(), seeded);
    }

    /// Fail the next call of `operation`.
    pub fn fail_next(&self, operation: AdapterOperation, error: AdapterError) {
        self.fail_after(operation, 0, error);
    }

    /// Let `skip` calls of `operation` succeed, then fail the following one.
    pub fn fail_after(&self, operation: AdapterOperation, skip: usize, error: AdapterError) {
        self.state.lock().faults.push(Fault {
            operation,
            skip,
            error,
        });
    }

    /// Current rows of a resource, bypassing the journal.
    pub fn rows(&self, connection: &str, resource: &str) -> Option<Vec<Row>> {
        let state = self.state.lock();
        state
            .connections
            .get(connection)?
            .resources
            .get(resource)
            .map(|r| r.rows.clone())
    }

    /// Current schema of a resource, bypassing the journal.
    pub fn schema(&self, connection: &str, resource: &str) -> Option<PhysicalSchema> {
        let state = self.state.lock();
        state
            .connections
            .get(connection)?
            .resources
            .get(resource)
            .map(|r| r.schema.clone())
    }

    /// Configuration a connection was registered with.
    pub fn connection_config(&self, connection: &str) -> Option<ConnectionConfig> {
        let state = self.state.lock();
        state
            .connections
            .get(connection)
            .filter(|c| c.registered)
            .map(|c| c.config.clone())
    }

    /// Every call recorded so far.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.state.lock().journal.clone()
    }

    /// Operations recorded so far, in call order.
    pub fn operations(&self) -> Vec<AdapterOperation> {
        self.state
            .lock()
            .journal
            .iter()
            .map(|entry| entry.operation)
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_journal(&self) {
        self.state.lock().journal.clear();
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn name(&self) -> &str {
        "memory"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn register_connection(
        &self,
        connection: &str,
        config: &ConnectionConfig,
    ) -> AdapterResult<()> {
        let mut state = self.state.lock();
        state.record(AdapterOperation::RegisterConnection, connection, None);
        state.take_fault(AdapterOperation::RegisterConnection)?;

        let conn = state.connections.entry(connection.to_string()).or_default();
        conn.registered = true;
        conn.config = config.clone();
        Ok(())
    }

    async fn describe(
        &self,
        connection: &str,
        resource: &str,
    ) -> AdapterResult<Option<PhysicalSchema>> {
        let introspection = self.capabilities.introspection;
        let mut state = self.state.lock();
        let conn = state.enter(AdapterOperation::Describe, connection, resource)?;

        if !introspection {
            return Ok(None);
        }
        Ok(conn.resources.get(resource).map(|r| r.schema.clone()))
    }

    async fn define(
        &self,
        connection: &str,
        resource: &str,
        schema: &DeclaredSchema,
    ) -> AdapterResult<PhysicalSchema> {
        let mut state = self.state.lock();
        let conn = state.enter(AdapterOperation::Define, connection, resource)?;

        let physical = PhysicalSchema::from_declared(schema);
        conn.resources
            .entry(resource.to_string())
            .and_modify(|r| r.schema = physical.clone())
            .or_insert_with(|| MemoryResource::new(physical.clone()));
        Ok(physical)
    }

    async fn find(
        &self,
        connection: &str,
        resource: &str,
        options: &QueryOptions,
    ) -> AdapterResult<Vec<Row>> {
        let mut state = self.state.lock();
        let conn = state.enter(AdapterOperation::Find, connection, resource)?;

        let stored = conn
            .resources
            .get(resource)
            .ok_or_else(|| AdapterError::NotFound {
                resource: resource.to_string(),
            })?;
        Ok(options.apply(stored.rows.iter().cloned(), stored.schema.primary_key()))
    }

    async fn create(&self, connection: &str, resource: &str, row: Row) -> AdapterResult<Row> {
        let mut state = self.state.lock();
        let conn = state.enter(AdapterOperation::Create, connection, resource)?;

        conn.resources
            .get_mut(resource)
            .ok_or_else(|| AdapterError::NotFound {
                resource: resource.to_string(),
            })?
            .insert(row)
    }

    async fn drop_resource(
        &self,
        connection: &str,
        resource: &str,
        relations: &[String],
    ) -> AdapterResult<()> {
        let mut state = self.state.lock();
        let conn = state.enter(AdapterOperation::Drop, connection, resource)?;

        if conn.resources.remove(resource).is_none() {
            return Err(AdapterError::NotFound {
                resource: resource.to_string(),
            });
        }
        for relation in relations {
            conn.resources.remove(relation);
        }
        Ok(())
    }
}
