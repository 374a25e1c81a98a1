//! TableOperations trait definition.

use anyhow::Result;
use sync_core::{ColumnNameMapping, DestinationStream, Record, TableName};

/// Operations every destination backend must provide.
///
/// Every method is potentially a remote round trip and may fail; the caller
/// does not retry. Locking and transaction strategy are left to the backend.
#[async_trait::async_trait]
pub trait TableOperations: Send + Sync {
    /// Create a namespace if it does not exist.
    ///
    /// Backends without namespaces keep the default no-op.
    async fn create_namespace(&self, _namespace: &str) -> Result<()> {
        Ok(())
    }

    async fn namespace_exists(&self, _namespace: &str) -> Result<bool> {
        Ok(false)
    }

    /// Create a table for `stream`.
    ///
    /// With `replace = false` an existing table is left untouched; with
    /// `replace = true` it is dropped and recreated empty.
    async fn create_table(
        &self,
        stream: &DestinationStream,
        table: &TableName,
        mapping: &ColumnNameMapping,
        replace: bool,
    ) -> Result<()>;

    async fn table_exists(&self, table: &TableName) -> Result<bool>;

    /// Drop a table; dropping a missing table is not an error.
    async fn drop_table(&self, table: &TableName) -> Result<()>;

    /// Number of rows in the table, `None` if the table does not exist.
    async fn count_table(&self, table: &TableName) -> Result<Option<i64>>;

    /// Generation id stamped on the table's rows.
    ///
    /// Returns 0 when the table is empty or carries no generation column.
    async fn get_generation_id(&self, table: &TableName) -> Result<i64>;

    /// Atomically replace `target`'s contents with `source`'s and remove `source`.
    async fn overwrite_table(&self, source: &TableName, target: &TableName) -> Result<()>;

    /// Append every row of `source` to `target`, without deduplication.
    async fn copy_table(
        &self,
        mapping: &ColumnNameMapping,
        source: &TableName,
        target: &TableName,
    ) -> Result<()>;

    /// Merge `source` into `target` by the stream's primary key.
    ///
    /// `source` is first deduplicated keeping the latest version of each key
    /// (by cursor, then extraction time). A winning row with a non-null
    /// `_ab_cdc_deleted_at` deletes the key from `target`.
    async fn upsert_table(
        &self,
        stream: &DestinationStream,
        mapping: &ColumnNameMapping,
        source: &TableName,
        target: &TableName,
    ) -> Result<()>;

    /// Insert records, stamping each with the stream's generation id.
    async fn insert_records(
        &self,
        stream: &DestinationStream,
        table: &TableName,
        mapping: &ColumnNameMapping,
        records: &[Record],
    ) -> Result<()>;
}
