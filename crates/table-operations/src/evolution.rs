//! Schema evolution: discover, compute, diff, apply.

use crate::traits::TableOperations;
use anyhow::Result;
use std::fmt::Debug;
use sync_core::{ColumnNameMapping, DestinationStream, TableName, TableSchema, TableSchemaDiff};

/// Diff of backend-specific table metadata (clustering, partitioning, ...).
pub trait AdditionalInfoDiff {
    /// True when the metadata needs no change.
    fn is_noop(&self) -> bool;
}

/// Backends without extra metadata use `()` for both info and diff.
impl AdditionalInfoDiff for () {
    fn is_noop(&self) -> bool {
        true
    }
}

/// What `ensure_schema_matches` did to the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaReconciliation {
    /// Table did not exist and was created
    Created,

    /// Table already matched
    Unchanged,

    /// Table was altered with this column diff
    Altered(TableSchemaDiff),
}

/// Reconciles a live table with the schema a stream expects.
///
/// The pipeline is `discover_schema` -> `compute_schema` -> diff columns and
/// additional info independently -> `apply_schema_diff`. Every step can be
/// overridden; `ensure_schema_matches` drives them.
#[async_trait::async_trait]
pub trait TableSchemaEvolution: TableOperations {
    /// Backend-specific table metadata diffed alongside columns.
    type AdditionalInfo: Debug + Clone + Send + Sync;

    type InfoDiff: AdditionalInfoDiff + Debug + Send + Sync;

    /// Introspect a live table; `None` when it does not exist.
    async fn discover_schema(
        &self,
        table: &TableName,
    ) -> Result<Option<(TableSchema, Self::AdditionalInfo)>>;

    /// Expected schema, derived purely from the stream's declared fields.
    fn compute_schema(
        &self,
        stream: &DestinationStream,
        mapping: &ColumnNameMapping,
    ) -> (TableSchema, Self::AdditionalInfo);

    fn diff_additional_info(
        &self,
        actual: &Self::AdditionalInfo,
        expected: &Self::AdditionalInfo,
    ) -> Self::InfoDiff;

    /// Issue the changes needed to reconcile the table.
    ///
    /// A change that cannot be applied without losing data must fail with
    /// `SyncError::IncompatibleSchema`.
    async fn apply_schema_diff(
        &self,
        stream: &DestinationStream,
        table: &TableName,
        expected_schema: &TableSchema,
        expected_info: &Self::AdditionalInfo,
        schema_diff: &TableSchemaDiff,
        info_diff: &Self::InfoDiff,
    ) -> Result<()>;

    /// Make `table` match the schema `stream` expects, creating it if absent.
    async fn ensure_schema_matches(
        &self,
        stream: &DestinationStream,
        table: &TableName,
        mapping: &ColumnNameMapping,
    ) -> Result<SchemaReconciliation> {
        let Some((actual_schema, actual_info)) = self.discover_schema(table).await? else {
            tracing::info!("Creating missing table {table} for stream {}", stream.id);
            self.create_table(stream, table, mapping, false).await?;
            return Ok(SchemaReconciliation::Created);
        };

        let (expected_schema, expected_info) = self.compute_schema(stream, mapping);
        let schema_diff = actual_schema.diff(&expected_schema);
        let info_diff = self.diff_additional_info(&actual_info, &expected_info);

        if schema_diff.is_noop() && info_diff.is_noop() {
            tracing::debug!("Schema of {table} already matches");
            return Ok(SchemaReconciliation::Unchanged);
        }

        tracing::info!(
            "Evolving schema of {}: {} to add, {} to drop, {} to change, {:?}",
            table,
            schema_diff.columns_to_add.len(),
            schema_diff.columns_to_drop.len(),
            schema_diff.columns_to_change.len(),
            info_diff
        );
        self.apply_schema_diff(
            stream,
            table,
            &expected_schema,
            &expected_info,
            &schema_diff,
            &info_diff,
        )
        .await?;
        Ok(SchemaReconciliation::Altered(schema_diff))
    }

    /// Whether the live table matches the expected schema; `None` if absent.
    async fn schema_matches(
        &self,
        stream: &DestinationStream,
        table: &TableName,
        mapping: &ColumnNameMapping,
    ) -> Result<Option<bool>> {
        let Some((actual_schema, actual_info)) = self.discover_schema(table).await? else {
            return Ok(None);
        };
        let (expected_schema, expected_info) = self.compute_schema(stream, mapping);
        let matches = actual_schema.diff(&expected_schema).is_noop()
            && self.diff_additional_info(&actual_info, &expected_info).is_noop();
        Ok(Some(matches))
    }
}
