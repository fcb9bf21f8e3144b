//! Migration strategy engine.
//!
//! Observes a resource, selects an action for the collection's policy,
//! and performs the adapter calls for it.

use super::error::MigrationError;
use super::policy::{ExistenceState, MigrationAction, MigrationPolicy};
use super::preserve::DataPreservation;
use crate::adapter::Adapter;
use crate::catalog::{CollectionDef, DeclaredSchema, PhysicalSchema};
use tracing::{debug, info, instrument, warn};

/// Migration engine configuration.
#[derive(Debug, Clone, Default)]
pub struct MigrationConfig {
    /// Policy for collections that do not name one.
    pub default_policy: MigrationPolicy,
}

impl MigrationConfig {
    /// Create a configuration with the default policy (`alter`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default policy.
    pub fn with_default_policy(mut self, policy: MigrationPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// The policy that applies to a collection.
    pub fn policy_for(&self, def: &CollectionDef) -> MigrationPolicy {
        def.migrate.unwrap_or(self.default_policy)
    }
}

/// Report of a successful reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// Resource name.
    pub resource: String,
    /// Policy applied.
    pub policy: MigrationPolicy,
    /// What introspection found before any change.
    pub existence: ExistenceState,
    /// Action performed.
    pub action: MigrationAction,
    /// The ready physical schema.
    pub schema: PhysicalSchema,
    /// Rows carried forward (only non-zero for `Preserve`).
    pub rows_restored: usize,
}

/// Reconciles resources on one connection of one adapter.
pub struct StrategyEngine<'a> {
    adapter: &'a dyn Adapter,
    connection: &'a str,
}

impl<'a> StrategyEngine<'a> {
    /// Create an engine for a connection.
    pub fn new(adapter: &'a dyn Adapter, connection: &'a str) -> Self {
        Self {
            adapter,
            connection,
        }
    }

    /// Introspect a resource and classify it.
    ///
    /// Adapters without introspection always yield `Missing`, and
    /// `describe` is not called.
    pub async fn observe(&self, resource: &str) -> Result<ExistenceState, MigrationError> {
        if !self.adapter.capabilities().introspection {
            debug!(
                adapter = self.adapter.name(),
                resource, "adapter lacks introspection; treating resource as missing"
            );
            return Ok(ExistenceState::Missing);
        }

        let described = self
            .adapter
            .describe(self.connection, resource)
            .await
            .map_err(|source| MigrationError::Describe {
                resource: resource.to_string(),
                source,
            })?;

        Ok(ExistenceState::classify(described))
    }

    /// Reconcile a resource with schema enforcement.
    pub async fn reconcile(
        &self,
        resource: &str,
        declared: &DeclaredSchema,
        policy: MigrationPolicy,
    ) -> Result<Reconciliation, MigrationError> {
        self.run(resource, declared, policy, true).await
    }

    /// Reconcile the resource behind a collection definition.
    pub async fn reconcile_collection(
        &self,
        def: &CollectionDef,
        config: &MigrationConfig,
    ) -> Result<Reconciliation, MigrationError> {
        let resource = def.resource_name();
        self.run(
            &resource,
            &def.attributes,
            config.policy_for(def),
            def.enforce_schema,
        )
        .await
    }

    #[instrument(
        skip_all,
        fields(connection = self.connection, resource = %resource, policy = %policy)
    )]
    async fn run(
        &self,
        resource: &str,
        declared: &DeclaredSchema,
        policy: MigrationPolicy,
        enforce_schema: bool,
    ) -> Result<Reconciliation, MigrationError> {
        let existence = self.observe(resource).await?;
        let action = MigrationAction::select(policy, &existence);

        debug!(existence = existence.label(), action = %action, "action selected");
        if policy.is_destructive() && action.mutates() && existence.exists() {
            warn!(
                existence = existence.label(),
                action = %action,
                "destructive policy will drop an existing resource"
            );
        }

        let mut rows_restored = 0;
        let schema = match action {
            MigrationAction::Reject => {
                return Err(MigrationError::SchemaNotReady {
                    resource: resource.to_string(),
                });
            }
            MigrationAction::Accept => existence.physical().unwrap_or_default(),
            MigrationAction::Define => self.define(resource, declared).await?,
            MigrationAction::Recreate => {
                self.drop_if_present(resource, &existence).await?;
                self.define(resource, declared).await?
            }
            MigrationAction::Preserve => {
                let mut preservation =
                    DataPreservation::new(self.adapter, self.connection, resource, declared);
                if !enforce_schema {
                    preservation = preservation.without_schema_enforcement();
                }
                let outcome = preservation.run().await?;
                rows_restored = outcome.restored;
                outcome.schema
            }
        };

        if action.mutates() {
            info!(
                existence = existence.label(),
                action = %action,
                rows_restored,
                "resource reconciled"
            );
        } else {
            debug!(existence = existence.label(), "resource left unchanged");
        }

        Ok(Reconciliation {
            resource: resource.to_string(),
            policy,
            existence,
            action,
            schema,
            rows_restored,
        })
    }

    async fn define(
        &self,
        resource: &str,
        declared: &DeclaredSchema,
    ) -> Result<PhysicalSchema, MigrationError> {
        self.adapter
            .define(self.connection, resource, declared)
            .await
            .map_err(|source| MigrationError::Define {
                resource: resource.to_string(),
                source,
            })
    }

    /// Drop for the `drop` policy, tolerating absence.
    async fn drop_if_present(
        &self,
        resource: &str,
        existence: &ExistenceState,
    ) -> Result<(), MigrationError> {
        match self
            .adapter
            .drop_resource(self.connection, resource, &[])
            .await
        {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() || !existence.exists() => {
                debug!(error = %err, "ignoring drop failure on absent resource");
                Ok(())
            }
            Err(source) => Err(MigrationError::Drop {
                resource: resource.to_string(),
                source,
            }),
        }
    }
}
