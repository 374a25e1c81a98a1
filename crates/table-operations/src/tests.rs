use crate::{expected_table_schema, SchemaReconciliation, TableOperations, TableSchemaEvolution};
use anyhow::Result;
use std::collections::BTreeMap;
use sync_core::{
    ColumnNameMapping, ColumnType, DestinationStream, FieldType, ImportType, Record, StreamField,
    StreamId, TableName, TableSchema, TableSchemaDiff, ToColumnType,
};
use tokio::sync::Mutex;

/// Backend that only tracks schemas and the calls made against it.
#[derive(Default)]
struct SchemaOnly {
    tables: Mutex<BTreeMap<TableName, TableSchema>>,
    calls: Mutex<Vec<String>>,
}

struct Types;

impl ToColumnType for Types {
    fn to_column_type(&self, field_type: &FieldType, nullable: bool) -> ColumnType {
        let name = match field_type {
            FieldType::Integer => "BIGINT",
            FieldType::String => "VARCHAR",
            FieldType::TimestampWithTimezone => "TIMESTAMPTZ",
            _ => "JSONB",
        };
        ColumnType::new(name, nullable)
    }
}

#[async_trait::async_trait]
impl TableOperations for SchemaOnly {
    async fn create_table(
        &self,
        stream: &DestinationStream,
        table: &TableName,
        mapping: &ColumnNameMapping,
        _replace: bool,
    ) -> Result<()> {
        self.calls.lock().await.push(format!("create {table}"));
        self.tables
            .lock()
            .await
            .insert(table.clone(), expected_table_schema(&Types, stream, mapping));
        Ok(())
    }

    async fn table_exists(&self, table: &TableName) -> Result<bool> {
        Ok(self.tables.lock().await.contains_key(table))
    }

    async fn drop_table(&self, table: &TableName) -> Result<()> {
        self.tables.lock().await.remove(table);
        Ok(())
    }

    async fn count_table(&self, table: &TableName) -> Result<Option<i64>> {
        Ok(self.tables.lock().await.get(table).map(|_| 0))
    }

    async fn get_generation_id(&self, _table: &TableName) -> Result<i64> {
        Ok(0)
    }

    async fn overwrite_table(&self, _source: &TableName, _target: &TableName) -> Result<()> {
        Ok(())
    }

    async fn copy_table(&self, _: &ColumnNameMapping, _: &TableName, _: &TableName) -> Result<()> {
        Ok(())
    }

    async fn upsert_table(
        &self,
        _: &DestinationStream,
        _: &ColumnNameMapping,
        _: &TableName,
        _: &TableName,
    ) -> Result<()> {
        Ok(())
    }

    async fn insert_records(
        &self,
        _: &DestinationStream,
        _: &TableName,
        _: &ColumnNameMapping,
        _: &[Record],
    ) -> Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl TableSchemaEvolution for SchemaOnly {
    type AdditionalInfo = ();
    type InfoDiff = ();

    async fn discover_schema(&self, table: &TableName) -> Result<Option<(TableSchema, ())>> {
        Ok(self.tables.lock().await.get(table).cloned().map(|s| (s, ())))
    }

    fn compute_schema(
        &self,
        stream: &DestinationStream,
        mapping: &ColumnNameMapping,
    ) -> (TableSchema, ()) {
        (expected_table_schema(&Types, stream, mapping), ())
    }

    fn diff_additional_info(&self, _: &(), _: &()) {}

    async fn apply_schema_diff(
        &self,
        _stream: &DestinationStream,
        table: &TableName,
        expected_schema: &TableSchema,
        _expected_info: &(),
        schema_diff: &TableSchemaDiff,
        _info_diff: &(),
    ) -> Result<()> {
        self.calls.lock().await.push(format!(
            "alter {table} +{} -{} ~{}",
            schema_diff.columns_to_add.len(),
            schema_diff.columns_to_drop.len(),
            schema_diff.columns_to_change.len()
        ));
        self.tables
            .lock()
            .await
            .insert(table.clone(), expected_schema.clone());
        Ok(())
    }
}

fn stream(fields: Vec<StreamField>) -> DestinationStream {
    DestinationStream {
        id: StreamId::new(Some("public"), "users"),
        fields,
        import_type: ImportType::Append,
        generation_id: 1,
        minimum_generation_id: 0,
        sync_id: 1,
    }
}

#[tokio::test]
async fn test_ensure_schema_creates_missing_table() {
    let backend = SchemaOnly::default();
    let table = TableName::new("public", "users");
    let s = stream(vec![StreamField::required("id", FieldType::Integer)]);
    let mapping = ColumnNameMapping::identity(["id"]);

    assert_eq!(backend.schema_matches(&s, &table, &mapping).await.unwrap(), None);
    let outcome = backend.ensure_schema_matches(&s, &table, &mapping).await.unwrap();
    assert_eq!(outcome, SchemaReconciliation::Created);
    assert_eq!(
        backend.schema_matches(&s, &table, &mapping).await.unwrap(),
        Some(true)
    );
}

#[tokio::test]
async fn test_ensure_schema_is_noop_when_matching() {
    let backend = SchemaOnly::default();
    let table = TableName::new("public", "users");
    let s = stream(vec![StreamField::required("id", FieldType::Integer)]);
    let mapping = ColumnNameMapping::identity(["id"]);

    backend.ensure_schema_matches(&s, &table, &mapping).await.unwrap();
    let outcome = backend.ensure_schema_matches(&s, &table, &mapping).await.unwrap();
    assert_eq!(outcome, SchemaReconciliation::Unchanged);
    assert_eq!(backend.calls.lock().await.len(), 1);
}

#[tokio::test]
async fn test_ensure_schema_applies_diff_for_new_field() {
    let backend = SchemaOnly::default();
    let table = TableName::new("public", "users");
    let mapping = ColumnNameMapping::identity(["id", "name"]);
    let v1 = stream(vec![StreamField::required("id", FieldType::Integer)]);
    backend.ensure_schema_matches(&v1, &table, &mapping).await.unwrap();

    let v2 = stream(vec![
        StreamField::required("id", FieldType::Integer),
        StreamField::new("name", FieldType::String),
    ]);
    assert_eq!(
        backend.schema_matches(&v2, &table, &mapping).await.unwrap(),
        Some(false)
    );
    let outcome = backend.ensure_schema_matches(&v2, &table, &mapping).await.unwrap();
    match outcome {
        SchemaReconciliation::Altered(diff) => {
            assert!(diff.columns_to_add.contains_key("name"));
            assert!(diff.columns_to_retain.contains("id"));
        }
        other => panic!("expected Altered, got {other:?}"),
    }
    assert_eq!(
        backend.calls.lock().await.last().map(String::as_str),
        Some("alter public.users +1 -0 ~0")
    );
}
