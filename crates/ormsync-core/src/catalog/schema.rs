//! Declared and physical schema mappings.

use super::attribute::{AttributeDef, AttributeSpec};
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the key adapters assign when a model declares no primary key.
pub const IMPLICIT_PRIMARY_KEY: &str = "id";

/// The attribute shape a model declares.
///
/// Attribute names are unique by construction. At most one attribute may
/// be marked as the primary key; see [`DeclaredSchema::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, AttributeSpec>",
    into = "BTreeMap<String, AttributeDef>"
)]
pub struct DeclaredSchema {
    attributes: BTreeMap<String, AttributeDef>,
}

impl DeclaredSchema {
    /// Create an empty declared schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, def: impl Into<AttributeDef>) -> Self {
        self.attributes.insert(name.into(), def.into());
        self
    }

    /// Get an attribute descriptor by name.
    pub fn get(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.get(name)
    }

    /// Check whether an attribute is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Iterate over declared attributes in name order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeDef)> {
        self.attributes.iter().map(|(name, def)| (name.as_str(), def))
    }

    /// Iterate over declared attribute names in name order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Number of declared attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if no attributes are declared.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Name of the primary-key attribute.
    ///
    /// Falls back to [`IMPLICIT_PRIMARY_KEY`] when none is declared.
    pub fn primary_key(&self) -> &str {
        self.declared_primary_key().unwrap_or(IMPLICIT_PRIMARY_KEY)
    }

    /// The primary-key attribute, if one is explicitly declared.
    pub fn declared_primary_key(&self) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(_, def)| def.primary_key)
            .map(|(name, _)| name.as_str())
    }

    /// Check the schema invariants.
    pub fn validate(&self) -> Result<(), Error> {
        let keys: Vec<&str> = self
            .attributes
            .iter()
            .filter(|(_, def)| def.primary_key)
            .map(|(name, _)| name.as_str())
            .collect();

        if keys.len() > 1 {
            return Err(Error::InvalidSchema(format!(
                "multiple primary keys declared: {}",
                keys.join(", ")
            )));
        }

        if self.attributes.keys().any(|name| name.is_empty()) {
            return Err(Error::InvalidSchema("empty attribute name".to_string()));
        }

        Ok(())
    }
}

impl From<BTreeMap<String, AttributeSpec>> for DeclaredSchema {
    fn from(specs: BTreeMap<String, AttributeSpec>) -> Self {
        Self {
            attributes: specs
                .into_iter()
                .map(|(name, spec)| (name, spec.into()))
                .collect(),
        }
    }
}

impl From<DeclaredSchema> for BTreeMap<String, AttributeDef> {
    fn from(schema: DeclaredSchema) -> Self {
        schema.attributes
    }
}

impl FromIterator<(String, AttributeDef)> for DeclaredSchema {
    fn from_iter<I: IntoIterator<Item = (String, AttributeDef)>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}

/// The attribute shape a backend reports for a materialized resource.
///
/// An empty physical schema means the resource exists with zero
/// attributes. A resource that does not exist at all is represented by
/// the absence of a `PhysicalSchema` (`None` from `describe`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhysicalSchema {
    attributes: BTreeMap<String, AttributeDef>,
}

impl PhysicalSchema {
    /// Create an empty physical schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize the shape of a declared schema.
    pub fn from_declared(declared: &DeclaredSchema) -> Self {
        Self {
            attributes: declared.attributes.clone(),
        }
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, def: impl Into<AttributeDef>) -> Self {
        self.attributes.insert(name.into(), def.into());
        self
    }

    /// Get an attribute descriptor by name.
    pub fn get(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.get(name)
    }

    /// Iterate over attribute names in name order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if the resource has zero attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Name of the primary-key attribute, falling back to the implicit key.
    pub fn primary_key(&self) -> &str {
        self.attributes
            .iter()
            .find(|(_, def)| def.primary_key)
            .map(|(name, _)| name.as_str())
            .unwrap_or(IMPLICIT_PRIMARY_KEY)
    }

    /// Check whether this physical shape is exactly the declared one.
    pub fn matches(&self, declared: &DeclaredSchema) -> bool {
        self.attributes == declared.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AttributeType;

    fn person() -> DeclaredSchema {
        DeclaredSchema::new()
            .with_attribute("id", AttributeDef::primary_key(AttributeType::Integer))
            .with_attribute("name", AttributeType::String)
            .with_attribute("age", AttributeType::Integer)
    }

    #[test]
    fn test_declared_schema_builder() {
        let schema = person();
        assert_eq!(schema.len(), 3);
        assert!(schema.contains("name"));
        assert!(!schema.contains("car"));
        assert_eq!(schema.primary_key(), "id");
        assert_eq!(
            schema.attribute_names().collect::<Vec<_>>(),
            vec!["age", "id", "name"]
        );
    }

    #[test]
    fn test_implicit_primary_key() {
        let schema = DeclaredSchema::new().with_attribute("x", AttributeType::String);
        assert_eq!(schema.declared_primary_key(), None);
        assert_eq!(schema.primary_key(), IMPLICIT_PRIMARY_KEY);
    }

    #[test]
    fn test_validate_rejects_two_primary_keys() {
        let schema = person().with_attribute("uuid", AttributeDef::primary_key(AttributeType::String));
        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("id, uuid"));
        assert!(person().validate().is_ok());
    }

    #[test]
    fn test_declared_schema_from_json_shorthand() {
        let schema: DeclaredSchema = serde_json::from_str(
            r#"{ "name": "string", "age": "integer", "id": { "type": "integer", "primaryKey": true } }"#,
        )
        .unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.get("name"), Some(&AttributeDef::new(AttributeType::String)));
        assert_eq!(schema.declared_primary_key(), Some("id"));
    }

    #[test]
    fn test_physical_schema_matches_declared() {
        let declared = person();
        let physical = PhysicalSchema::from_declared(&declared);
        assert!(physical.matches(&declared));
        assert_eq!(physical.primary_key(), "id");

        let legacy = PhysicalSchema::new()
            .with_attribute("name", AttributeType::String)
            .with_attribute("age", AttributeType::Number);
        assert!(!legacy.matches(&declared));
        assert!(!legacy.is_empty());
        assert!(PhysicalSchema::new().is_empty());
    }
}
