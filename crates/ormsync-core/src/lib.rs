//! ormsync Core - Schema reconciliation for pluggable storage adapters.
//!
//! At startup every declared collection is brought in line with its
//! backend resource according to a migration policy. Backends are reached
//! only through the [`Adapter`] contract.

pub mod adapter;
pub mod catalog;
pub mod config;
pub mod error;
pub mod migration;
pub mod orchestrator;
pub mod row;

pub use adapter::{
    Adapter, AdapterError, AdapterOperation, AdapterResult, Capabilities, ConnectionConfig,
    MemoryAdapter, QueryOptions,
};
pub use catalog::{
    AttributeDef, AttributeSpec, AttributeType, CollectionDef, DeclaredSchema, PhysicalSchema,
    IMPLICIT_PRIMARY_KEY,
};
pub use config::{collections_from_json, load_collections, ConnectionEntry, OrchestratorConfig};
pub use error::Error;
pub use migration::{
    DataPreservation, ExistenceState, MigrationAction, MigrationConfig, MigrationError,
    MigrationPolicy, Reconciliation, StrategyEngine,
};
pub use orchestrator::{
    CollectionFailure, Collections, InitializationError, Orchestrator, ReadyCollection,
};
pub use row::{Row, Value};
