//! Attribute type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical attribute types a model can declare.
///
/// The engine never coerces values between types; the type is carried
/// through to the adapter so it can materialize a matching column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    /// Short UTF-8 string.
    String,
    /// Long-form text.
    Text,
    /// Signed integer.
    Integer,
    /// Floating point number.
    Float,
    /// Generic number, as reported by loosely typed backends.
    Number,
    /// Boolean value.
    Boolean,
    /// Calendar date.
    Date,
    /// Date and time.
    Datetime,
    /// Binary data.
    Binary,
    /// Array of values.
    Array,
    /// Arbitrary JSON document.
    Json,
}

impl AttributeType {
    /// Check if values of this type can be generated as sequential keys.
    pub fn is_sequential(&self) -> bool {
        matches!(self, AttributeType::Integer | AttributeType::Number)
    }

    /// The lowercase name used in model definitions.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Text => "text",
            AttributeType::Integer => "integer",
            AttributeType::Float => "float",
            AttributeType::Number => "number",
            AttributeType::Boolean => "boolean",
            AttributeType::Date => "date",
            AttributeType::Datetime => "datetime",
            AttributeType::Binary => "binary",
            AttributeType::Array => "array",
            AttributeType::Json => "json",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
