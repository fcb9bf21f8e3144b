//! Row values and the shared projection rules.
//!
//! Every component that narrows a row to a set of attributes goes through
//! [`project_row`], so the primary key survives any projection the same
//! way everywhere.

use std::collections::BTreeMap;

pub use serde_json::Value;

/// A single row: attribute name to value.
///
/// Rows make no promise that every declared attribute is present, and may
/// carry attributes the current schema no longer declares.
pub type Row = BTreeMap<String, Value>;

/// Project a row onto the named attributes.
///
/// The primary key is kept whenever the row carries it, even if it is not
/// among `attributes`. Absent attributes stay absent.
pub fn project_row<'a>(
    row: &Row,
    attributes: impl IntoIterator<Item = &'a str>,
    primary_key: &'a str,
) -> Row {
    let mut projected = Row::new();
    for name in attributes.into_iter().chain(std::iter::once(primary_key)) {
        if let Some(value) = row.get(name) {
            projected.insert(name.to_string(), value.clone());
        }
    }
    projected
}

/// Check a row against an equality filter.
///
/// Every filter entry must be present in the row with an equal value.
pub fn matches_where(row: &Row, criteria: &Row) -> bool {
    criteria
        .iter()
        .all(|(name, expected)| row.get(name) == Some(expected))
}

/// Build a row from a JSON object value.
///
/// Returns `None` if the value is not an object.
pub fn row_from_value(value: Value) -> Option<Row> {
    match value {
        Value::Object(map) => Some(map.into_iter().collect()),
        _ => None,
    }
}
