//! Attribute descriptors.

use super::types::AttributeType;
use serde::{Deserialize, Serialize};

/// Descriptor for a single named attribute.
///
/// The attribute name is the key under which the descriptor is stored in
/// a schema mapping, so it is not repeated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDef {
    /// Attribute data type.
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    /// Whether this attribute is the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Whether the attribute is required at the application level.
    #[serde(default)]
    pub required: bool,
}

impl AttributeDef {
    /// Create an optional, non-key attribute.
    pub fn new(attribute_type: AttributeType) -> Self {
        Self {
            attribute_type,
            primary_key: false,
            required: false,
        }
    }

    /// Create a primary-key attribute.
    pub fn primary_key(attribute_type: AttributeType) -> Self {
        Self {
            attribute_type,
            primary_key: true,
            required: true,
        }
    }

    /// Mark as required.
    pub fn with_required(mut self) -> Self {
        self.required = true;
        self
    }
}

impl From<AttributeType> for AttributeDef {
    fn from(attribute_type: AttributeType) -> Self {
        Self::new(attribute_type)
    }
}

/// Attribute as written in a model definition.
///
/// Accepts the shorthand `"name": "string"` as well as the full
/// `{ "type": "string", "required": true }` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeSpec {
    /// Type name only.
    Short(AttributeType),
    /// Full descriptor.
    Full(AttributeDef),
}

impl From<AttributeSpec> for AttributeDef {
    fn from(spec: AttributeSpec) -> Self {
        match spec {
            AttributeSpec::Short(ty) => AttributeDef::new(ty),
            AttributeSpec::Full(def) => def,
        }
    }
}
