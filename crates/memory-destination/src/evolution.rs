use crate::widening::{convert_value, ChangeStrategy};
use crate::{FailPoint, MemoryDestination, MemoryTypes};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sync_core::{
    ColumnNameMapping, DestinationStream, SyncError, TableName, TableSchema, TableSchemaDiff,
};
use table_operations::{
    ddl, expected_table_schema, physical_column, AdditionalInfoDiff, TableSchemaEvolution,
};

/// Physical layout of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLayout {
    /// Clustering columns; dedupe streams cluster on their primary key
    pub clustering: Vec<String>,
}

/// Change of clustering columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusteringChange {
    pub from: Vec<String>,
    pub to: Vec<String>,
}

impl AdditionalInfoDiff for ClusteringChange {
    fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

impl MemoryDestination {
    pub(crate) fn layout_for(stream: &DestinationStream, mapping: &ColumnNameMapping) -> TableLayout {
        TableLayout {
            clustering: stream
                .primary_key()
                .iter()
                .map(|pk| physical_column(mapping, pk).to_string())
                .collect(),
        }
    }
}

fn incompatible(table: &TableName, column: &str, from: String, to: String) -> anyhow::Error {
    SyncError::IncompatibleSchema {
        table: table.to_string(),
        column: column.to_string(),
        from,
        to,
    }
    .into()
}

#[async_trait::async_trait]
impl TableSchemaEvolution for MemoryDestination {
    type AdditionalInfo = TableLayout;
    type InfoDiff = ClusteringChange;

    async fn discover_schema(&self, table: &TableName) -> Result<Option<(TableSchema, TableLayout)>> {
        let catalog = self.catalog.read().await;
        Ok(catalog
            .tables
            .get(table)
            .map(|t| (t.schema.clone(), t.layout.clone())))
    }

    fn compute_schema(
        &self,
        stream: &DestinationStream,
        mapping: &ColumnNameMapping,
    ) -> (TableSchema, TableLayout) {
        (
            expected_table_schema(&MemoryTypes, stream, mapping),
            Self::layout_for(stream, mapping),
        )
    }

    fn diff_additional_info(&self, actual: &TableLayout, expected: &TableLayout) -> ClusteringChange {
        ClusteringChange {
            from: actual.clustering.clone(),
            to: expected.clustering.clone(),
        }
    }

    async fn apply_schema_diff(
        &self,
        _stream: &DestinationStream,
        table: &TableName,
        expected_schema: &TableSchema,
        expected_info: &TableLayout,
        schema_diff: &TableSchemaDiff,
        info_diff: &ClusteringChange,
    ) -> Result<()> {
        self.check_fail_point(FailPoint::ApplySchemaDiff).await?;

        let mut catalog = self.catalog.write().await;
        let target = catalog.table_mut(table)?;
        let has_rows = !target.rows.is_empty();

        // Validate everything before touching the table.
        for (name, column_type) in &schema_diff.columns_to_add {
            if has_rows && !column_type.nullable {
                return Err(incompatible(
                    table,
                    name,
                    "<absent>".to_string(),
                    column_type.declaration(),
                ));
            }
        }
        for (name, change) in &schema_diff.columns_to_change {
            let values = || target.rows.iter().filter_map(|r| r.get(name));
            let holds_data = values().any(|v| !v.is_null());
            let holds_nulls = target.rows.iter().any(|r| r.get(name).map_or(true, Value::is_null));

            let strategy = self.policy().classify(change);
            if strategy == ChangeStrategy::Rebuild && holds_data {
                return Err(incompatible(
                    table,
                    name,
                    change.old.declaration(),
                    change.new.declaration(),
                ));
            }
            if change.old.nullable && !change.new.nullable && holds_nulls {
                return Err(incompatible(
                    table,
                    name,
                    change.old.declaration(),
                    change.new.declaration(),
                ));
            }
        }

        for statement in ddl::render_schema_diff(table, schema_diff) {
            tracing::debug!("Applying schema change to {table}: {statement}");
        }

        for row in target.rows.iter_mut() {
            for name in &schema_diff.columns_to_drop {
                row.remove(name);
            }
            for name in schema_diff.columns_to_add.keys() {
                row.insert(name.clone(), Value::Null);
            }
            for (name, change) in &schema_diff.columns_to_change {
                if let Some(value) = row.remove(name) {
                    row.insert(name.clone(), convert_value(value, &change.new.type_name));
                }
            }
        }
        target.schema = expected_schema.clone();

        if !info_diff.is_noop() {
            tracing::debug!(
                "Changing clustering of {} from {:?} to {:?}",
                table,
                info_diff.from,
                info_diff.to
            );
            target.layout = expected_info.clone();
        }
        drop(catalog);

        self.record(format!("alter {table}")).await;
        Ok(())
    }
}
