//! Adapter contract.
//!
//! Every storage backend implements [`Adapter`]. The migration engine only
//! talks to backends through this trait and never special-cases one.
//! Every call is keyed by `(connection, resource)`.

mod error;
pub mod memory;

pub use error::{AdapterError, AdapterResult};
pub use memory::{JournalEntry, MemoryAdapter};

use crate::catalog::{DeclaredSchema, PhysicalSchema};
use crate::row::{matches_where, project_row, Row, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Options passed to [`Adapter::register_connection`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Backend-specific settings (path, url, credentials, ...).
    #[serde(default, flatten)]
    pub options: BTreeMap<String, Value>,
}

impl ConnectionConfig {
    /// Create an empty connection configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a backend-specific option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Get a string option.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }
}

/// Optional capabilities an adapter advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether `describe` reports the real physical shape.
    ///
    /// When false the engine treats every resource as missing.
    pub introspection: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            introspection: true,
        }
    }
}

/// Read options for [`Adapter::find`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Equality filter. Empty matches every row.
    #[serde(default, rename = "where")]
    pub criteria: Row,
    /// Attributes to project. The primary key is always included.
    #[serde(default)]
    pub select: Option<Vec<String>>,
    /// Maximum number of rows to return.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl QueryOptions {
    /// Match every row, unprojected.
    pub fn all() -> Self {
        Self::default()
    }

    /// Add an equality constraint.
    pub fn where_eq(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.criteria.insert(name.into(), value.into());
        self
    }

    /// Project the given attributes.
    pub fn with_select<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    /// Limit the number of rows.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check whether these options place no constraint on the result.
    pub fn is_unconstrained(&self) -> bool {
        self.criteria.is_empty() && self.select.is_none() && self.limit.is_none()
    }

    /// Check a row against the `where` filter.
    pub fn matches(&self, row: &Row) -> bool {
        matches_where(row, &self.criteria)
    }

    /// Apply the `select` projection, keeping the primary key.
    pub fn project(&self, row: Row, primary_key: &str) -> Row {
        match &self.select {
            Some(select) if !select.is_empty() => {
                project_row(&row, select.iter().map(String::as_str), primary_key)
            }
            _ => row,
        }
    }

    /// Filter, project and limit a row sequence, preserving order.
    pub fn apply<I>(&self, rows: I, primary_key: &str) -> Vec<Row>
    where
        I: IntoIterator<Item = Row>,
    {
        if self.is_unconstrained() {
            return rows.into_iter().collect();
        }

        let limit = self.limit.unwrap_or(usize::MAX);
        rows.into_iter()
            .filter(|row| self.matches(row))
            .take(limit)
            .map(|row| self.project(row, primary_key))
            .collect()
    }
}

/// Adapter contract operations, used in journals and fault plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterOperation {
    /// `register_connection`.
    RegisterConnection,
    /// `describe`.
    Describe,
    /// `define`.
    Define,
    /// `find`.
    Find,
    /// `create`.
    Create,
    /// `drop`.
    Drop,
}

impl fmt::Display for AdapterOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdapterOperation::RegisterConnection => "register_connection",
            AdapterOperation::Describe => "describe",
            AdapterOperation::Define => "define",
            AdapterOperation::Find => "find",
            AdapterOperation::Create => "create",
            AdapterOperation::Drop => "drop",
        };
        f.write_str(name)
    }
}

/// Check whether a resource's primary key is generated on insert.
///
/// Sequential keys (and the implicit key of a schema that declares none)
/// are assigned by the adapter when a row arrives without one.
pub fn key_is_generated(schema: &PhysicalSchema) -> bool {
    match schema.get(schema.primary_key()) {
        Some(def) => def.attribute_type.is_sequential(),
        None => true,
    }
}

/// Storage backend contract.
///
/// All operations report failure through [`AdapterError`]. Behavior of
/// `define` on an existing resource is adapter-defined; callers must not
/// rely on it being additive.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Adapter name, for logs.
    fn name(&self) -> &str;

    /// Capabilities this adapter supports.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Establish or validate a connection. Idempotent per connection name.
    async fn register_connection(
        &self,
        connection: &str,
        config: &ConnectionConfig,
    ) -> AdapterResult<()>;

    /// Introspect a resource. `None` means the resource does not exist.
    async fn describe(
        &self,
        connection: &str,
        resource: &str,
    ) -> AdapterResult<Option<PhysicalSchema>>;

    /// Create a resource with the given shape.
    async fn define(
        &self,
        connection: &str,
        resource: &str,
        schema: &DeclaredSchema,
    ) -> AdapterResult<PhysicalSchema>;

    /// Read rows in insertion order.
    async fn find(
        &self,
        connection: &str,
        resource: &str,
        options: &QueryOptions,
    ) -> AdapterResult<Vec<Row>>;

    /// Insert one row. Returns the row as persisted.
    async fn create(&self, connection: &str, resource: &str, row: Row) -> AdapterResult<Row>;

    /// Destroy a resource, its data, and the named related resources.
    ///
    /// This is the contract's `drop`; the name avoids colliding with
    /// `Drop::drop` on smart-pointer receivers.
    async fn drop_resource(
        &self,
        connection: &str,
        resource: &str,
        relations: &[String],
    ) -> AdapterResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AttributeDef, AttributeType};
    use crate::row::row_from_value;
    use serde_json::json;

    fn rows() -> Vec<Row> {
        vec![
            row_from_value(json!({ "id": 1, "name": "batman", "age": 50 })).unwrap(),
            row_from_value(json!({ "id": 2, "name": "robin", "age": 20 })).unwrap(),
            row_from_value(json!({ "id": 3, "name": "alfred", "age": 50 })).unwrap(),
        ]
    }

    #[test]
    fn test_select_forces_primary_key() {
        let options = QueryOptions::all().with_select(["name"]);
        let found = options.apply(rows(), "id");
        assert_eq!(found.len(), 3);
        for row in &found {
            assert_eq!(row.keys().collect::<Vec<_>>(), vec!["id", "name"]);
        }
    }

    #[test]
    fn test_where_and_limit_preserve_order() {
        let options = QueryOptions::all().where_eq("age", 50);
        let found = options.apply(rows(), "id");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0]["name"], json!("batman"));
        assert_eq!(found[1]["name"], json!("alfred"));

        let limited = options.with_limit(1).apply(rows(), "id");
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0]["name"], json!("batman"));
    }

    #[test]
    fn test_empty_select_returns_full_rows() {
        let options = QueryOptions::all().with_select(Vec::<String>::new());
        assert_eq!(options.apply(rows(), "id"), rows());
        assert_eq!(QueryOptions::all().apply(rows(), "id"), rows());
        assert!(QueryOptions::all().is_unconstrained());
        assert!(!options.is_unconstrained());
    }

    #[test]
    fn test_query_options_from_json() {
        let options: QueryOptions =
            serde_json::from_str(r#"{ "where": { "id": 1 }, "select": ["name"] }"#).unwrap();
        assert_eq!(options.criteria["id"], json!(1));
        assert_eq!(options.select, Some(vec!["name".to_string()]));
    }

    #[test]
    fn test_key_is_generated() {
        let integer_key = PhysicalSchema::new()
            .with_attribute("id", AttributeDef::primary_key(AttributeType::Integer));
        let string_key = PhysicalSchema::new()
            .with_attribute("slug", AttributeDef::primary_key(AttributeType::String));
        let implicit = PhysicalSchema::new().with_attribute("name", AttributeType::String);

        assert!(key_is_generated(&integer_key));
        assert!(!key_is_generated(&string_key));
        assert!(key_is_generated(&implicit));
    }

    #[test]
    fn test_connection_config() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{ "path": "/tmp/db", "temporary": true }"#).unwrap();
        assert_eq!(config.get_str("path"), Some("/tmp/db"));
        assert_eq!(
            ConnectionConfig::new().with_option("url", "x").get_str("url"),
            Some("x")
        );
    }
}
