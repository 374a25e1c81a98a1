//! Unit tests for the in-memory destination.

use crate::types::{BIGINT, VARCHAR};
use crate::{FailPoint, MemoryDestination, Row, TableLayout, WideningPolicy};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use sync_core::record::{COLUMN_GENERATION_ID, COLUMN_RAW_DATA};
use sync_core::{
    ColumnNameMapping, ColumnType, DestinationStream, FieldType, ImportType, Record, StreamField,
    StreamId, SyncError, TableName, TableSchema,
};
use table_operations::{SchemaReconciliation, TableOperations, TableSchemaEvolution};

fn users(import_type: ImportType, generation_id: i64) -> DestinationStream {
    DestinationStream {
        id: StreamId::new(Some("app"), "users"),
        fields: vec![
            StreamField::required("id", FieldType::Integer),
            StreamField::new("name", FieldType::String),
            StreamField::new("updated_at", FieldType::Integer),
            StreamField::new("_ab_cdc_deleted_at", FieldType::TimestampWithTimezone),
        ],
        import_type,
        generation_id,
        minimum_generation_id: 0,
        sync_id: 1,
    }
}

fn dedupe() -> ImportType {
    ImportType::Dedupe {
        primary_key: vec!["id".into()],
        cursor: Some("updated_at".into()),
    }
}

fn mapping() -> ColumnNameMapping {
    ColumnNameMapping::identity(["id", "name", "updated_at", "_ab_cdc_deleted_at"])
}

fn record(v: Value, second: u32) -> Record {
    Record::from_json(v).with_extracted_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, second).unwrap())
}

fn names(rows: &[Row]) -> Vec<Value> {
    rows.iter().map(|r| r["name"].clone()).collect()
}

async fn setup(dest: &MemoryDestination, stream: &DestinationStream, table: &TableName) {
    dest.create_namespace(&table.namespace).await.unwrap();
    dest.create_table(stream, table, &mapping(), false).await.unwrap();
}

#[tokio::test]
async fn test_create_table_requires_namespace() {
    let dest = MemoryDestination::new();
    let table = TableName::new("app", "users");
    let err = dest
        .create_table(&users(ImportType::Append, 1), &table, &mapping(), false)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Namespace app"));
    assert!(!dest.namespace_exists("app").await.unwrap());
}

#[tokio::test]
async fn test_create_table_replace_semantics() {
    let dest = MemoryDestination::new();
    let table = TableName::new("app", "users");
    let stream = users(ImportType::Append, 1);
    setup(&dest, &stream, &table).await;
    dest.insert_records(&stream, &table, &mapping(), &[record(json!({"id": 1}), 0)])
        .await
        .unwrap();

    dest.create_table(&stream, &table, &mapping(), false).await.unwrap();
    assert_eq!(dest.count_table(&table).await.unwrap(), Some(1));

    dest.create_table(&stream, &table, &mapping(), true).await.unwrap();
    assert_eq!(dest.count_table(&table).await.unwrap(), Some(0));
}

#[tokio::test]
async fn test_count_and_generation_id() {
    let dest = MemoryDestination::new();
    let table = TableName::new("app", "users");
    let stream = users(ImportType::Append, 4);

    assert_eq!(dest.count_table(&table).await.unwrap(), None);
    setup(&dest, &stream, &table).await;
    assert_eq!(dest.get_generation_id(&table).await.unwrap(), 0);

    dest.insert_records(&stream, &table, &mapping(), &[record(json!({"id": 1}), 0)])
        .await
        .unwrap();
    assert_eq!(dest.get_generation_id(&table).await.unwrap(), 4);
    assert_eq!(dest.rows(&table).await[0][COLUMN_GENERATION_ID], json!(4));
}

#[tokio::test]
async fn test_overwrite_replaces_target_and_removes_source() {
    let dest = MemoryDestination::new();
    let stream = users(ImportType::Append, 2);
    let final_table = TableName::new("app", "users");
    let temp = final_table.temp_table();
    setup(&dest, &stream, &final_table).await;
    dest.create_table(&stream, &temp, &mapping(), true).await.unwrap();
    dest.insert_records(&stream, &final_table, &mapping(), &[record(json!({"id": 1, "name": "old"}), 0)])
        .await
        .unwrap();
    dest.insert_records(&stream, &temp, &mapping(), &[record(json!({"id": 2, "name": "new"}), 0)])
        .await
        .unwrap();

    dest.overwrite_table(&temp, &final_table).await.unwrap();
    assert!(!dest.table_exists(&temp).await.unwrap());
    assert_eq!(names(&dest.rows(&final_table).await), vec![json!("new")]);
}

#[tokio::test]
async fn test_overwrite_failure_leaves_target_intact() {
    let dest = MemoryDestination::new();
    let stream = users(ImportType::Append, 2);
    let final_table = TableName::new("app", "users");
    let temp = final_table.temp_table();
    setup(&dest, &stream, &final_table).await;
    dest.create_table(&stream, &temp, &mapping(), true).await.unwrap();
    dest.insert_records(&stream, &final_table, &mapping(), &[record(json!({"id": 1, "name": "old"}), 0)])
        .await
        .unwrap();

    dest.fail_next(FailPoint::OverwriteTable).await;
    assert!(dest.overwrite_table(&temp, &final_table).await.is_err());
    assert_eq!(names(&dest.rows(&final_table).await), vec![json!("old")]);
    assert!(dest.table_exists(&temp).await.unwrap());

    // Fail points fire once.
    dest.overwrite_table(&temp, &final_table).await.unwrap();
}

#[tokio::test]
async fn test_upsert_dedupes_and_deletes() {
    let dest = MemoryDestination::new();
    let stream = users(dedupe(), 1);
    let final_table = TableName::new("app", "users");
    let staging = final_table.temp_table();
    setup(&dest, &stream, &final_table).await;
    dest.create_table(&stream, &staging, &mapping(), true).await.unwrap();

    dest.insert_records(
        &stream,
        &final_table,
        &mapping(),
        &[
            record(json!({"id": 1, "name": "alice", "updated_at": 1}), 0),
            record(json!({"id": 2, "name": "bob", "updated_at": 1}), 0),
        ],
    )
    .await
    .unwrap();
    dest.insert_records(
        &stream,
        &staging,
        &mapping(),
        &[
            record(json!({"id": 1, "name": "alice-v2", "updated_at": 2}), 1),
            record(json!({"id": 1, "name": "alice-v3", "updated_at": 3}), 2),
            record(
                json!({"id": 2, "updated_at": 2, "_ab_cdc_deleted_at": "2024-01-01T00:00:00Z"}),
                1,
            ),
            record(json!({"id": 3, "name": "carol", "updated_at": 1}), 1),
        ],
    )
    .await
    .unwrap();

    dest.upsert_table(&stream, &mapping(), &staging, &final_table)
        .await
        .unwrap();
    let rows = dest.rows(&final_table).await;
    assert_eq!(names(&rows), vec![json!("alice-v3"), json!("carol")]);
}

#[tokio::test]
async fn test_upsert_requires_primary_key() {
    let dest = MemoryDestination::new();
    let stream = users(
        ImportType::Dedupe {
            primary_key: vec![],
            cursor: None,
        },
        1,
    );
    let table = TableName::new("app", "users");
    setup(&dest, &stream, &table).await;
    let err = dest
        .upsert_table(&stream, &mapping(), &table, &table)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::MissingPrimaryKey { .. })
    ));
}

#[tokio::test]
async fn test_copy_unpacks_legacy_raw_rows() {
    let dest = MemoryDestination::new();
    let stream = users(ImportType::Append, 1);
    let final_table = TableName::new("app", "users");
    let legacy = final_table.legacy_raw_table();

    let legacy_schema = TableSchema::new()
        .with_column("_airbyte_raw_id", ColumnType::not_null(VARCHAR))
        .with_column("_airbyte_extracted_at", ColumnType::not_null("TIMESTAMP WITH TIME ZONE"))
        .with_column(COLUMN_RAW_DATA, ColumnType::nullable("JSONB"));
    let legacy_row = json!({
        "_airbyte_raw_id": "r1",
        "_airbyte_extracted_at": "2023-01-01T00:00:00.000000Z",
        "_airbyte_data": {"id": 9, "name": "legacy"},
    });
    let Value::Object(legacy_row) = legacy_row else { unreachable!() };
    dest.seed_table(&legacy, legacy_schema, vec![legacy_row]).await;
    dest.create_table(&stream, &final_table, &mapping(), false).await.unwrap();

    dest.copy_table(&mapping(), &legacy, &final_table).await.unwrap();
    let rows = dest.rows(&final_table).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], json!(9));
    assert_eq!(rows[0]["name"], json!("legacy"));
    assert_eq!(rows[0]["_airbyte_raw_id"], json!("r1"));
    assert_eq!(rows[0][COLUMN_GENERATION_ID], Value::Null);
}

#[tokio::test]
async fn test_evolution_widens_in_place() {
    let dest = MemoryDestination::new();
    let table = TableName::new("app", "users");
    let mut stream = users(ImportType::Append, 1);
    setup(&dest, &stream, &table).await;
    dest.insert_records(&stream, &table, &mapping(), &[record(json!({"id": 1, "updated_at": 17}), 0)])
        .await
        .unwrap();

    // updated_at: BIGINT -> VARCHAR keeps the value as text
    stream.fields[2] = StreamField::new("updated_at", FieldType::String);
    let outcome = dest
        .ensure_schema_matches(&stream, &table, &mapping())
        .await
        .unwrap();
    assert!(matches!(outcome, SchemaReconciliation::Altered(_)));
    let t = dest.read_table(&table).await.unwrap();
    assert_eq!(t.schema.get("updated_at"), Some(&ColumnType::nullable(VARCHAR)));
    assert_eq!(t.rows[0]["updated_at"], json!("17"));
}

#[tokio::test]
async fn test_evolution_rejects_lossy_change_on_populated_column() {
    let dest = MemoryDestination::new();
    let table = TableName::new("app", "users");
    let mut stream = users(ImportType::Append, 1);
    setup(&dest, &stream, &table).await;
    dest.insert_records(&stream, &table, &mapping(), &[record(json!({"id": 1, "name": "x"}), 0)])
        .await
        .unwrap();

    stream.fields[1] = StreamField::new("name", FieldType::Integer);
    let err = dest
        .ensure_schema_matches(&stream, &table, &mapping())
        .await
        .unwrap_err();
    match err.downcast_ref::<SyncError>() {
        Some(e @ SyncError::IncompatibleSchema { column, from, to, .. }) => {
            assert_eq!(column, "name");
            assert_eq!(from, VARCHAR);
            assert_eq!(to, BIGINT);
            assert!(e.is_config_error());
        }
        other => panic!("expected IncompatibleSchema, got {other:?}"),
    }
    // Nothing was applied.
    let t = dest.read_table(&table).await.unwrap();
    assert_eq!(t.schema.get("name"), Some(&ColumnType::nullable(VARCHAR)));
}

#[tokio::test]
async fn test_evolution_rebuilds_empty_column() {
    let dest = MemoryDestination::with_policy(WideningPolicy::strict());
    let table = TableName::new("app", "users");
    let mut stream = users(ImportType::Append, 1);
    setup(&dest, &stream, &table).await;
    dest.insert_records(&stream, &table, &mapping(), &[record(json!({"id": 1}), 0)])
        .await
        .unwrap();

    // `name` holds only nulls, so a lossy change is allowed.
    stream.fields[1] = StreamField::new("name", FieldType::Integer);
    dest.ensure_schema_matches(&stream, &table, &mapping())
        .await
        .unwrap();
    let t = dest.read_table(&table).await.unwrap();
    assert_eq!(t.schema.get("name"), Some(&ColumnType::nullable(BIGINT)));
}

#[tokio::test]
async fn test_clustering_follows_primary_key() {
    let dest = MemoryDestination::new();
    let table = TableName::new("app", "users");
    let append = users(ImportType::Append, 1);
    setup(&dest, &append, &table).await;
    assert_eq!(dest.read_table(&table).await.unwrap().layout, TableLayout::default());

    let deduped = users(dedupe(), 1);
    assert_eq!(
        dest.schema_matches(&deduped, &table, &mapping()).await.unwrap(),
        Some(false)
    );
    dest.ensure_schema_matches(&deduped, &table, &mapping())
        .await
        .unwrap();
    assert_eq!(
        dest.read_table(&table).await.unwrap().layout.clustering,
        vec!["id".to_string()]
    );
}

#[tokio::test]
async fn test_journal_records_mutations() {
    let dest = MemoryDestination::new();
    let table = TableName::new("app", "users");
    let stream = users(ImportType::Append, 1);
    setup(&dest, &stream, &table).await;
    dest.drop_table(&table).await.unwrap();
    dest.drop_table(&table).await.unwrap();
    assert_eq!(
        dest.journal().await,
        vec!["create namespace app", "create app.users", "drop app.users"]
    );
}
