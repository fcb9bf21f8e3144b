//! Embedded storage adapter for ormsync, backed by sled.
//!
//! Each registered connection opens one sled database. Resource schemas
//! live in a shared `schema` tree; rows of a resource live in their own
//! tree keyed by a monotonic id, so scans return rows in insertion order.

mod adapter;
mod config;
mod error;

pub use adapter::SledAdapter;
pub use config::SledConfig;
pub use error::SledError;
