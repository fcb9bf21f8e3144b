//! Data preservation protocol.
//!
//! Converges an existing resource to a declared schema on backends with
//! no native alter primitive:
//!
//! 1. Snapshot every row with an unconstrained `find`.
//! 2. Drop the resource.
//! 3. Define it again with the declared schema.
//! 4. Re-insert each snapshot row, in order, restricted to declared
//!    attributes (the primary key always survives).
//!
//! Steps run strictly in sequence. Nothing is rolled back: a failure in
//! steps 3 or 4 is reported as [`MigrationError::PostDropFailure`].

use super::error::MigrationError;
use crate::adapter::{Adapter, QueryOptions};
use crate::catalog::{DeclaredSchema, PhysicalSchema};
use crate::row::{project_row, Row};
use tracing::{debug, error, info, warn};

/// Result of a completed preservation run.
#[derive(Debug, Clone, PartialEq)]
pub struct PreservationOutcome {
    /// Schema returned by the redefinition.
    pub schema: PhysicalSchema,
    /// Rows captured by the snapshot.
    pub snapshot_len: usize,
    /// Rows re-inserted.
    pub restored: usize,
}

/// Restrict a row to the attributes a declared schema knows about.
///
/// Undeclared keys are dropped, absent declared attributes stay absent,
/// and the primary key is kept whenever the row carries it.
pub fn filter_row(row: &Row, declared: &DeclaredSchema) -> Row {
    project_row(row, declared.attribute_names(), declared.primary_key())
}

/// One preservation run against a single resource.
pub struct DataPreservation<'a> {
    adapter: &'a dyn Adapter,
    connection: &'a str,
    resource: &'a str,
    declared: &'a DeclaredSchema,
    enforce_schema: bool,
}

impl<'a> DataPreservation<'a> {
    /// Prepare a run.
    pub fn new(
        adapter: &'a dyn Adapter,
        connection: &'a str,
        resource: &'a str,
        declared: &'a DeclaredSchema,
    ) -> Self {
        Self {
            adapter,
            connection,
            resource,
            declared,
            enforce_schema: true,
        }
    }

    /// Re-insert rows unfiltered (schemaless collections).
    pub fn without_schema_enforcement(mut self) -> Self {
        self.enforce_schema = false;
        self
    }

    /// Execute all steps.
    pub async fn run(&self) -> Result<PreservationOutcome, MigrationError> {
        let snapshot = self.snapshot().await?;
        let snapshot_len = snapshot.len();

        self.tear_down().await?;

        let schema = match self.redefine().await {
            Ok(schema) => schema,
            Err(cause) => {
                error!(
                    resource = self.resource,
                    lost_rows = snapshot_len,
                    "redefinition failed after drop; manual recovery required"
                );
                return Err(MigrationError::post_drop(self.resource, 0, snapshot, cause));
            }
        };

        let restored = self.restore(snapshot).await?;

        info!(
            resource = self.resource,
            snapshot_len, restored, "resource altered with data preserved"
        );

        Ok(PreservationOutcome {
            schema,
            snapshot_len,
            restored,
        })
    }

    /// Capture the full current row set.
    async fn snapshot(&self) -> Result<Vec<Row>, MigrationError> {
        let rows = self
            .adapter
            .find(self.connection, self.resource, &QueryOptions::all())
            .await
            .map_err(|source| MigrationError::Query {
                resource: self.resource.to_string(),
                source,
            })?;

        debug!(resource = self.resource, rows = rows.len(), "snapshot captured");
        Ok(rows)
    }

    async fn tear_down(&self) -> Result<(), MigrationError> {
        warn!(resource = self.resource, "dropping resource for redefinition");
        self.adapter
            .drop_resource(self.connection, self.resource, &[])
            .await
            .map_err(|source| MigrationError::Drop {
                resource: self.resource.to_string(),
                source,
            })
    }

    async fn redefine(&self) -> Result<PhysicalSchema, MigrationError> {
        self.adapter
            .define(self.connection, self.resource, self.declared)
            .await
            .map_err(|source| MigrationError::Define {
                resource: self.resource.to_string(),
                source,
            })
    }

    /// Re-insert snapshot rows in order. Returns the number restored.
    async fn restore(&self, snapshot: Vec<Row>) -> Result<usize, MigrationError> {
        let mut rows = snapshot.into_iter().enumerate();
        let mut restored = 0;

        while let Some((row_index, original)) = rows.next() {
            let row = if self.enforce_schema {
                filter_row(&original, self.declared)
            } else {
                original.clone()
            };

            if let Err(source) = self.adapter.create(self.connection, self.resource, row).await {
                let unrestored: Vec<Row> = std::iter::once(original)
                    .chain(rows.by_ref().map(|(_, row)| row))
                    .collect();

                error!(
                    resource = self.resource,
                    restored,
                    lost_rows = unrestored.len(),
                    error = %source,
                    "restore failed after drop; manual recovery required"
                );

                let cause = MigrationError::Write {
                    resource: self.resource.to_string(),
                    row_index,
                    source,
                };
                return Err(MigrationError::post_drop(
                    self.resource,
                    restored,
                    unrestored,
                    cause,
                ));
            }
            restored += 1;
        }

        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterError, AdapterOperation, ConnectionConfig, MemoryAdapter};
    use crate::catalog::{AttributeDef, AttributeType};
    use crate::row::{row_from_value, Value};
    use serde_json::json;

    const CONN: &str = "default";

    fn row(value: Value) -> Row {
        row_from_value(value).unwrap()
    }

    fn declared() -> DeclaredSchema {
        DeclaredSchema::new()
            .with_attribute("id", AttributeDef::primary_key(AttributeType::Integer))
            .with_attribute("name", AttributeType::String)
    }

    async fn seeded(rows: Vec<Row>) -> MemoryAdapter {
        let adapter = MemoryAdapter::new();
        adapter.seed(
            CONN,
            "person",
            PhysicalSchema::new().with_attribute("name", AttributeType::String),
            rows,
        );
        adapter
            .register_connection(CONN, &ConnectionConfig::new())
            .await
            .unwrap();
        adapter.clear_journal();
        adapter
    }

    #[test]
    fn test_filter_row_trims_undeclared() {
        let filtered = filter_row(
            &row(json!({ "id": 1, "name": "batman", "car": "batmobile" })),
            &declared(),
        );
        assert_eq!(filtered, row(json!({ "id": 1, "name": "batman" })));
    }

    #[test]
    fn test_filter_row_keeps_implicit_key() {
        let declared = DeclaredSchema::new().with_attribute("name", AttributeType::String);
        let filtered = filter_row(&row(json!({ "id": 7, "car": "batmobile" })), &declared);
        assert_eq!(filtered, row(json!({ "id": 7 })));
    }

    #[test]
    fn test_filter_row_does_not_synthesize() {
        let filtered = filter_row(&row(json!({ "car": "batmobile" })), &declared());
        assert!(filtered.is_empty());
    }

    #[tokio::test]
    async fn test_run_steps_in_order() {
        let adapter = seeded(vec![
            row(json!({ "id": 1, "name": "batman", "car": "batmobile" })),
            row(json!({ "id": 2, "name": "robin" })),
        ])
        .await;
        let declared = declared();

        let outcome = DataPreservation::new(&adapter, CONN, "person", &declared)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.snapshot_len, 2);
        assert_eq!(outcome.restored, 2);
        assert!(outcome.schema.matches(&declared));
        assert_eq!(
            adapter.operations(),
            vec![
                AdapterOperation::Find,
                AdapterOperation::Drop,
                AdapterOperation::Define,
                AdapterOperation::Create,
                AdapterOperation::Create,
            ]
        );
        assert_eq!(
            adapter.rows(CONN, "person").unwrap(),
            vec![
                row(json!({ "id": 1, "name": "batman" })),
                row(json!({ "id": 2, "name": "robin" })),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_without_schema_enforcement_keeps_extra_attributes() {
        let adapter = seeded(vec![row(json!({ "id": 1, "name": "batman", "car": "batmobile" }))]).await;
        let declared = declared();

        DataPreservation::new(&adapter, CONN, "person", &declared)
            .without_schema_enforcement()
            .run()
            .await
            .unwrap();

        assert_eq!(adapter.rows(CONN, "person").unwrap()[0]["car"], json!("batmobile"));
    }

    #[tokio::test]
    async fn test_empty_rows_are_still_restored() {
        let adapter = seeded(vec![row(json!({ "car": "batmobile" }))]).await;
        let declared = DeclaredSchema::new().with_attribute(
            "slug",
            AttributeDef::primary_key(AttributeType::String),
        );

        let outcome = DataPreservation::new(&adapter, CONN, "person", &declared)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.restored, 1);
        assert_eq!(adapter.rows(CONN, "person").unwrap(), vec![Row::new()]);
    }

    #[tokio::test]
    async fn test_write_failure_reports_unrestored_rows() {
        let adapter = seeded(vec![
            row(json!({ "id": 1, "name": "batman" })),
            row(json!({ "id": 2, "name": "robin", "car": "bike" })),
            row(json!({ "id": 3, "name": "alfred" })),
        ])
        .await;
        adapter.fail_after(
            AdapterOperation::Create,
            1,
            AdapterError::Backend("disk full".to_string()),
        );
        let declared = declared();

        let err = DataPreservation::new(&adapter, CONN, "person", &declared)
            .run()
            .await
            .unwrap_err();

        match err {
            MigrationError::PostDropFailure {
                restored,
                unrestored,
                source,
                ..
            } => {
                assert_eq!(restored, 1);
                assert_eq!(unrestored.len(), 2);
                // Unrestored rows are reported as snapshotted, unfiltered.
                assert_eq!(unrestored[0]["car"], json!("bike"));
                assert!(matches!(*source, MigrationError::Write { row_index: 1, .. }));
            }
            other => panic!("expected PostDropFailure, got {other:?}"),
        }
        assert_eq!(adapter.rows(CONN, "person").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_define_failure_after_drop_is_data_loss() {
        let adapter = seeded(vec![row(json!({ "id": 1, "name": "batman" }))]).await;
        adapter.fail_next(
            AdapterOperation::Define,
            AdapterError::Backend("no space".to_string()),
        );
        let declared = declared();

        let err = DataPreservation::new(&adapter, CONN, "person", &declared)
            .run()
            .await
            .unwrap_err();

        assert!(err.is_data_loss());
        if let MigrationError::PostDropFailure {
            restored,
            unrestored,
            source,
            ..
        } = err
        {
            assert_eq!(restored, 0);
            assert_eq!(unrestored.len(), 1);
            assert!(matches!(*source, MigrationError::Define { .. }));
        }
        assert!(adapter.schema(CONN, "person").is_none());
    }

    #[tokio::test]
    async fn test_drop_failure_is_not_data_loss() {
        let adapter = seeded(vec![row(json!({ "id": 1 }))]).await;
        adapter.fail_next(
            AdapterOperation::Drop,
            AdapterError::Backend("locked".to_string()),
        );
        let declared = declared();

        let err = DataPreservation::new(&adapter, CONN, "person", &declared)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, MigrationError::Drop { .. }));
        assert!(!err.is_data_loss());
        assert_eq!(adapter.rows(CONN, "person").unwrap().len(), 1);
    }
}
