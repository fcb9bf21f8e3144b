//! Collection (model) definitions.

use super::schema::DeclaredSchema;
use crate::error::Error;
use crate::migration::MigrationPolicy;
use serde::{Deserialize, Serialize};

/// A declared collection: one model bound to one backend resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDef {
    /// Collection identity (unique across the orchestrator).
    pub identity: String,
    /// Backend resource name. Defaults to the lowercased identity.
    #[serde(default)]
    pub table_name: Option<String>,
    /// Name of the connection the collection lives on.
    pub connection: String,
    /// Migration policy. Falls back to the configured default.
    #[serde(default)]
    pub migrate: Option<MigrationPolicy>,
    /// Whether rows are restricted to declared attributes.
    #[serde(default = "default_enforce_schema", rename = "schema")]
    pub enforce_schema: bool,
    /// Declared attributes.
    pub attributes: DeclaredSchema,
}

fn default_enforce_schema() -> bool {
    true
}

impl CollectionDef {
    /// Create a new collection definition.
    pub fn new(identity: impl Into<String>, connection: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            table_name: None,
            connection: connection.into(),
            migrate: None,
            enforce_schema: true,
            attributes: DeclaredSchema::new(),
        }
    }

    /// Set the backend resource name.
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Set the migration policy.
    pub fn with_migrate(mut self, policy: MigrationPolicy) -> Self {
        self.migrate = Some(policy);
        self
    }

    /// Set the declared attributes.
    pub fn with_attributes(mut self, attributes: DeclaredSchema) -> Self {
        self.attributes = attributes;
        self
    }

    /// Allow rows to carry undeclared attributes.
    pub fn schemaless(mut self) -> Self {
        self.enforce_schema = false;
        self
    }

    /// The backend resource name.
    pub fn resource_name(&self) -> String {
        self.table_name
            .clone()
            .unwrap_or_else(|| self.identity.to_lowercase())
    }

    /// Parse a collection definition from JSON.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let def: CollectionDef = serde_json::from_str(json)?;
        def.validate()?;
        Ok(def)
    }

    /// Check the definition invariants.
    pub fn validate(&self) -> Result<(), Error> {
        if self.identity.is_empty() {
            return Err(Error::InvalidSchema("collection identity is empty".to_string()));
        }
        if self.table_name.as_deref() == Some("") {
            return Err(Error::InvalidSchema(format!(
                "collection {} has an empty table name",
                self.identity
            )));
        }
        self.attributes.validate()
    }
}
