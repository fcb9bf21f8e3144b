//! Migration engine.
//!
//! Brings a backend resource in line with a collection's declared schema
//! according to its [`MigrationPolicy`]:
//!
//! | Policy   | Missing  | Exists, no attributes | Exists       |
//! |----------|----------|-----------------------|--------------|
//! | `safe`   | error    | accept                | accept       |
//! | `create` | define   | define                | accept       |
//! | `alter`  | define   | preserve              | preserve     |
//! | `drop`   | recreate | recreate              | recreate     |
//!
//! "Preserve" is the snapshot / drop / define / restore sequence in
//! [`preserve`]. Only its last two steps can lose data, and failures there
//! surface as [`MigrationError::PostDropFailure`].
//!
//! Running `alter` for the same resource from two processes at once is
//! not supported; nothing here takes a lock.
//!
//! # Example
//!
//! ```ignore
//! use ormsync_core::migration::{MigrationPolicy, StrategyEngine};
//!
//! let engine = StrategyEngine::new(&adapter, "default");
//! let result = engine.reconcile("person", &schema, MigrationPolicy::Alter).await?;
//! println!("{} rows carried forward", result.rows_restored);
//! ```

pub mod error;
pub mod policy;
pub mod preserve;
pub mod strategy;

pub use error::MigrationError;
pub use policy::{ExistenceState, MigrationAction, MigrationPolicy};
pub use preserve::{filter_row, DataPreservation, PreservationOutcome};
pub use strategy::{MigrationConfig, Reconciliation, StrategyEngine};
