//! End-to-end reconciliation against the in-memory adapter.

use ormsync_core::row::row_from_value;
use ormsync_core::{
    collections_from_json, Adapter, AdapterError, AdapterOperation, AttributeDef, AttributeType,
    CollectionDef, ConnectionConfig, DeclaredSchema, MemoryAdapter, MigrationError,
    MigrationPolicy, Orchestrator, OrchestratorConfig, PhysicalSchema, QueryOptions, Row,
    StrategyEngine,
};
use serde_json::json;
use std::sync::Arc;

const CONN: &str = "default";

fn row(value: serde_json::Value) -> Row {
    row_from_value(value).unwrap()
}

async fn registered() -> MemoryAdapter {
    let adapter = MemoryAdapter::new();
    adapter
        .register_connection(CONN, &ConnectionConfig::new())
        .await
        .unwrap();
    adapter.clear_journal();
    adapter
}

async fn seeded(schema: PhysicalSchema, rows: Vec<Row>) -> MemoryAdapter {
    let adapter = MemoryAdapter::new();
    adapter.seed(CONN, "person", schema, rows);
    adapter
        .register_connection(CONN, &ConnectionConfig::new())
        .await
        .unwrap();
    adapter.clear_journal();
    adapter
}

fn legacy() -> PhysicalSchema {
    PhysicalSchema::new()
        .with_attribute("name", AttributeType::String)
        .with_attribute("age", AttributeType::Number)
}

fn declared() -> DeclaredSchema {
    DeclaredSchema::new()
        .with_attribute("name", AttributeType::String)
        .with_attribute("age", AttributeType::Integer)
        .with_attribute("id", AttributeDef::primary_key(AttributeType::Integer))
}

fn batcave() -> Vec<Row> {
    vec![
        row(json!({ "id": 1, "name": "batman", "car": "batmobile", "age": 50 })),
        row(json!({ "id": 2, "name": "robin", "age": 20, "mask": true })),
        row(json!({ "id": 3, "car": "tumbler" })),
    ]
}

/// Every existence state the engine can observe.
async fn existence_states() -> Vec<MemoryAdapter> {
    vec![
        registered().await,
        seeded(PhysicalSchema::new(), Vec::new()).await,
        seeded(legacy(), batcave()).await,
    ]
}

async fn alter(adapter: &MemoryAdapter, declared: &DeclaredSchema) {
    StrategyEngine::new(adapter, CONN)
        .reconcile("person", declared, MigrationPolicy::Alter)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_alter_on_missing_defines_empty_resource() {
    let adapter = registered().await;
    let declared = DeclaredSchema::new().with_attribute("x", AttributeType::String);

    let result = StrategyEngine::new(&adapter, CONN)
        .reconcile("person", &declared, MigrationPolicy::Alter)
        .await
        .unwrap();

    assert!(result.schema.matches(&declared));
    assert_eq!(result.rows_restored, 0);
    assert!(adapter.rows(CONN, "person").unwrap().is_empty());
    assert_eq!(
        adapter.operations(),
        vec![AdapterOperation::Describe, AdapterOperation::Define]
    );
}

#[tokio::test]
async fn test_alter_restores_filtered_rows_in_order() {
    let adapter = seeded(legacy(), batcave()).await;

    alter(&adapter, &declared()).await;

    assert_eq!(
        adapter.rows(CONN, "person").unwrap(),
        vec![
            row(json!({ "id": 1, "name": "batman", "age": 50 })),
            row(json!({ "id": 2, "name": "robin", "age": 20 })),
            row(json!({ "id": 3 })),
        ]
    );
}

#[tokio::test]
async fn test_alter_is_idempotent() {
    let adapter = seeded(legacy(), batcave()).await;

    alter(&adapter, &declared()).await;
    let once = adapter.rows(CONN, "person").unwrap();

    alter(&adapter, &declared()).await;
    assert_eq!(adapter.rows(CONN, "person").unwrap(), once);
}

#[tokio::test]
async fn test_undeclared_attributes_never_restored() {
    let adapter = seeded(legacy(), batcave()).await;
    let declared = DeclaredSchema::new().with_attribute("name", AttributeType::String);

    alter(&adapter, &declared).await;

    for restored in adapter.rows(CONN, "person").unwrap() {
        for key in restored.keys() {
            assert!(key == "id" || declared.contains(key), "unexpected {key}");
        }
    }
}

#[tokio::test]
async fn test_alter_carries_rows_of_schemaless_resource() {
    let adapter = seeded(PhysicalSchema::new(), batcave()).await;

    let result = StrategyEngine::new(&adapter, CONN)
        .reconcile("person", &declared(), MigrationPolicy::Alter)
        .await
        .unwrap();

    assert_eq!(result.rows_restored, 3);
    assert_eq!(adapter.rows(CONN, "person").unwrap().len(), 3);
}

#[tokio::test]
async fn test_safe_only_describes() {
    for adapter in existence_states().await {
        let _ = StrategyEngine::new(&adapter, CONN)
            .reconcile("person", &declared(), MigrationPolicy::Safe)
            .await;
        assert_eq!(adapter.operations(), vec![AdapterOperation::Describe]);
    }
}

#[tokio::test]
async fn test_create_never_drops() {
    let expected_defines = [1, 1, 0];
    for (adapter, defines) in existence_states().await.into_iter().zip(expected_defines) {
        StrategyEngine::new(&adapter, CONN)
            .reconcile("person", &declared(), MigrationPolicy::Create)
            .await
            .unwrap();

        let ops = adapter.operations();
        assert!(!ops.contains(&AdapterOperation::Drop));
        assert!(!ops.contains(&AdapterOperation::Create));
        let count = ops
            .iter()
            .filter(|op| **op == AdapterOperation::Define)
            .count();
        assert_eq!(count, defines);
    }
}

#[tokio::test]
async fn test_batman_loses_his_car() {
    let adapter = seeded(
        legacy(),
        vec![row(
            json!({ "id": 1, "name": "batman", "car": "batmobile", "age": 50 }),
        )],
    )
    .await;

    alter(&adapter, &declared()).await;

    let found = adapter
        .find(CONN, "person", &QueryOptions::all().where_eq("id", 1))
        .await
        .unwrap();
    assert_eq!(found, vec![row(json!({ "id": 1, "name": "batman", "age": 50 }))]);
    assert!(!found[0].contains_key("car"));
}

#[tokio::test]
async fn test_snapshot_failure_leaves_backend_untouched() {
    let adapter = seeded(legacy(), batcave()).await;
    adapter.fail_next(
        AdapterOperation::Find,
        AdapterError::Backend("timeout".to_string()),
    );

    let err = StrategyEngine::new(&adapter, CONN)
        .reconcile("person", &declared(), MigrationPolicy::Alter)
        .await
        .unwrap_err();

    assert!(matches!(err, MigrationError::Query { .. }));
    assert_eq!(
        adapter.operations(),
        vec![AdapterOperation::Describe, AdapterOperation::Find]
    );
    assert_eq!(adapter.rows(CONN, "person").unwrap(), batcave());
    assert_eq!(adapter.schema(CONN, "person").unwrap(), legacy());
}

#[tokio::test]
async fn test_orchestrator_reports_data_loss() {
    let adapter = Arc::new(seeded(legacy(), batcave()).await);
    adapter.fail_after(
        AdapterOperation::Create,
        1,
        AdapterError::Constraint {
            message: "age out of range".to_string(),
        },
    );

    let config = OrchestratorConfig::new()
        .with_connection(CONN, adapter.clone(), ConnectionConfig::new())
        .with_collection(CollectionDef::new("Person", CONN).with_attributes(declared()))
        .with_collection(
            CollectionDef::new("Pet", CONN)
                .with_attributes(DeclaredSchema::new().with_attribute("species", AttributeType::String)),
        );

    let err = Orchestrator::new(config).initialize().await.unwrap_err();

    assert_eq!(err.failures.len(), 1);
    assert!(err.has_data_loss());
    match err.failure("Person") {
        Some(MigrationError::PostDropFailure {
            restored,
            unrestored,
            ..
        }) => {
            assert_eq!(*restored, 1);
            assert_eq!(unrestored.len(), 2);
        }
        other => panic!("expected PostDropFailure, got {other:?}"),
    }
    assert!(err.to_string().contains("DATA LOSS"));
}

#[tokio::test]
async fn test_orchestrator_publishes_schemas() {
    let adapter = Arc::new(seeded(legacy(), batcave()).await);

    let config = OrchestratorConfig::new()
        .with_connection(CONN, adapter.clone(), ConnectionConfig::new())
        .with_collection(CollectionDef::new("Person", CONN).with_attributes(declared()));

    let collections = Orchestrator::new(config).initialize().await.unwrap();
    let person = collections.get("Person").unwrap();

    assert!(person.schema().matches(&declared()));
    assert_eq!(person.reconciliation().rows_restored, 3);

    let robin = person
        .find_one(&QueryOptions::all().where_eq("id", 2).with_select(["name"]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(robin, row(json!({ "id": 2, "name": "robin" })));
}

#[tokio::test]
async fn test_json_model_with_table_name_and_shorthand_key() {
    let defs = collections_from_json(
        r#"[{
            "identity": "person",
            "tableName": "person_table",
            "connection": "default",
            "migrate": "alter",
            "attributes": { "name": "string", "age": "integer", "id": "integer" }
        }]"#,
    )
    .unwrap();

    let adapter = Arc::new(MemoryAdapter::new());
    adapter.seed(
        CONN,
        "person_table",
        legacy(),
        vec![row(
            json!({ "id": 1, "name": "batman", "car": "batmobile", "age": 50 }),
        )],
    );

    let config = OrchestratorConfig::new()
        .with_connection(CONN, adapter.clone(), ConnectionConfig::new())
        .with_collections(defs);
    let collections = Orchestrator::new(config).initialize().await.unwrap();

    let person = collections.get("person").unwrap();
    assert_eq!(person.resource(), "person_table");

    let found = person
        .find_one(&QueryOptions::all().where_eq("id", 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, row(json!({ "id": 1, "name": "batman", "age": 50 })));
    assert!(adapter.rows(CONN, "person").is_none());
}
