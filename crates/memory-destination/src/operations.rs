use crate::merge::{merge, MergeKeys};
use crate::{FailPoint, MemoryDestination, MemoryTable, Row};
use anyhow::Result;
use chrono::SecondsFormat;
use serde_json::Value;
use sync_core::record::{
    COLUMN_CDC_DELETED_AT, COLUMN_EXTRACTED_AT, COLUMN_GENERATION_ID, COLUMN_META, COLUMN_RAW_DATA,
    COLUMN_RAW_ID, META_COLUMNS,
};
use sync_core::{ColumnNameMapping, DestinationStream, Record, SyncError, TableName};
use table_operations::{ddl, physical_column, TableOperations, TableSchemaEvolution};

/// Project `row` onto the columns of `target`.
///
/// Legacy raw rows keep field values inside `_airbyte_data`; those are
/// unpacked through the column mapping.
fn project(row: &Row, target: &MemoryTable, mapping: &ColumnNameMapping) -> Row {
    let legacy = row.get(COLUMN_RAW_DATA).and_then(Value::as_object);
    target
        .schema
        .columns()
        .iter()
        .map(|column| {
            let value = row.get(&column.name).cloned().or_else(|| {
                let logical = mapping
                    .iter()
                    .find(|(_, physical)| *physical == column.name)
                    .map(|(logical, _)| logical)?;
                legacy?.get(logical).cloned()
            });
            (column.name.clone(), value.unwrap_or(Value::Null))
        })
        .collect()
}

#[async_trait::async_trait]
impl TableOperations for MemoryDestination {
    async fn create_namespace(&self, namespace: &str) -> Result<()> {
        let created = self
            .catalog
            .write()
            .await
            .namespaces
            .insert(namespace.to_string());
        if created {
            self.record(format!("create namespace {namespace}")).await;
        }
        Ok(())
    }

    async fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        Ok(self.catalog.read().await.namespaces.contains(namespace))
    }

    async fn create_table(
        &self,
        stream: &DestinationStream,
        table: &TableName,
        mapping: &ColumnNameMapping,
        replace: bool,
    ) -> Result<()> {
        self.check_fail_point(FailPoint::CreateTable).await?;
        let (schema, layout) = self.compute_schema(stream, mapping);

        let mut catalog = self.catalog.write().await;
        if !catalog.namespaces.contains(&table.namespace) {
            anyhow::bail!("Namespace {} does not exist", table.namespace);
        }
        if catalog.tables.contains_key(table) && !replace {
            return Ok(());
        }
        for statement in ddl::render_create_table(table, &schema, replace) {
            tracing::debug!("Creating table {table}: {statement}");
        }
        catalog.tables.insert(
            table.clone(),
            MemoryTable {
                schema,
                layout,
                rows: Vec::new(),
            },
        );
        drop(catalog);

        let verb = if replace { "replace" } else { "create" };
        self.record(format!("{verb} {table}")).await;
        Ok(())
    }

    async fn table_exists(&self, table: &TableName) -> Result<bool> {
        Ok(self.catalog.read().await.tables.contains_key(table))
    }

    async fn drop_table(&self, table: &TableName) -> Result<()> {
        let dropped = self.catalog.write().await.tables.remove(table).is_some();
        if dropped {
            self.record(format!("drop {table}")).await;
        }
        Ok(())
    }

    async fn count_table(&self, table: &TableName) -> Result<Option<i64>> {
        let catalog = self.catalog.read().await;
        Ok(catalog.tables.get(table).map(|t| t.rows.len() as i64))
    }

    async fn get_generation_id(&self, table: &TableName) -> Result<i64> {
        let catalog = self.catalog.read().await;
        let target = catalog.table(table)?;
        Ok(target
            .rows
            .first()
            .and_then(|row| row.get(COLUMN_GENERATION_ID))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }

    async fn overwrite_table(&self, source: &TableName, target: &TableName) -> Result<()> {
        self.check_fail_point(FailPoint::OverwriteTable).await?;

        let mut catalog = self.catalog.write().await;
        let table = catalog.tables.remove(source).ok_or_else(|| SyncError::TableNotFound {
            table: source.to_string(),
        })?;
        catalog.tables.insert(target.clone(), table);
        drop(catalog);

        self.record(format!("overwrite {source} -> {target}")).await;
        Ok(())
    }

    async fn copy_table(
        &self,
        mapping: &ColumnNameMapping,
        source: &TableName,
        target: &TableName,
    ) -> Result<()> {
        let mut catalog = self.catalog.write().await;
        let rows = catalog.table(source)?.rows.clone();
        let destination = catalog.table_mut(target)?;
        let copied: Vec<Row> = rows
            .iter()
            .map(|row| project(row, destination, mapping))
            .collect();
        let count = copied.len();
        destination.rows.extend(copied);
        drop(catalog);

        self.record(format!("copy {source} -> {target} ({count} rows)")).await;
        Ok(())
    }

    async fn upsert_table(
        &self,
        stream: &DestinationStream,
        mapping: &ColumnNameMapping,
        source: &TableName,
        target: &TableName,
    ) -> Result<()> {
        self.check_fail_point(FailPoint::UpsertTable).await?;
        if stream.primary_key().is_empty() {
            return Err(SyncError::MissingPrimaryKey {
                stream: stream.id.to_string(),
            }
            .into());
        }
        let keys = MergeKeys {
            primary_key: stream
                .primary_key()
                .iter()
                .map(|pk| physical_column(mapping, pk))
                .collect(),
            cursor: stream.cursor().map(|c| physical_column(mapping, c)),
            cdc_deleted_at: physical_column(mapping, COLUMN_CDC_DELETED_AT),
        };

        let mut catalog = self.catalog.write().await;
        let rows = catalog.table(source)?.rows.clone();
        let destination = catalog.table_mut(target)?;
        let incoming: Vec<Row> = rows
            .iter()
            .map(|row| project(row, destination, mapping))
            .collect();
        let stats = merge(&mut destination.rows, incoming, &keys);
        drop(catalog);

        tracing::debug!(
            "Merged {} into {}: {} inserted, {} updated, {} deleted, {} skipped",
            source,
            target,
            stats.inserted,
            stats.updated,
            stats.deleted,
            stats.skipped
        );
        self.record(format!("upsert {source} -> {target}")).await;
        Ok(())
    }

    async fn insert_records(
        &self,
        stream: &DestinationStream,
        table: &TableName,
        mapping: &ColumnNameMapping,
        records: &[Record],
    ) -> Result<()> {
        self.check_fail_point(FailPoint::InsertRecords).await?;

        let rows: Vec<Row> = records
            .iter()
            .map(|record| {
                let mut row = Row::new();
                row.insert(COLUMN_RAW_ID.to_string(), Value::String(record.raw_id.to_string()));
                row.insert(
                    COLUMN_EXTRACTED_AT.to_string(),
                    Value::String(record.extracted_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
                );
                row.insert(COLUMN_META.to_string(), record.meta.to_column_value(stream.sync_id));
                row.insert(COLUMN_GENERATION_ID.to_string(), Value::from(stream.generation_id));
                for field in &stream.fields {
                    let value = record.get(&field.name).cloned().unwrap_or(Value::Null);
                    row.insert(physical_column(mapping, &field.name).to_string(), value);
                }
                row
            })
            .collect();

        let mut catalog = self.catalog.write().await;
        let target = catalog.table_mut(table)?;
        if let Some(column) = META_COLUMNS.iter().find(|c| !target.schema.contains(c)) {
            anyhow::bail!("Table {table} is missing metadata column {column}");
        }
        let projected: Vec<Row> = rows.iter().map(|r| project(r, target, mapping)).collect();
        target.rows.extend(projected);
        drop(catalog);

        tracing::debug!("Inserted {} records into {}", records.len(), table);
        self.record(format!("insert {table} ({} rows)", records.len())).await;
        Ok(())
    }
}
