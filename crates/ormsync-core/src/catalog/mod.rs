//! Schema model: attribute types, declared and physical schemas, and
//! collection definitions.

mod attribute;
mod collection;
mod schema;
mod types;

pub use attribute::{AttributeDef, AttributeSpec};
pub use collection::CollectionDef;
pub use schema::{DeclaredSchema, PhysicalSchema, IMPLICIT_PRIMARY_KEY};
pub use types::AttributeType;
