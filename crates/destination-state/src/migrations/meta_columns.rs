use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use sync_core::record::{COLUMN_GENERATION_ID, COLUMN_META};
use sync_core::{DestinationState, InitialStatus, StreamConfig, TableSchemaDiff};
use table_operations::TableSchemaEvolution;

use crate::migration::{Migration, MigrationResult};

/// Adds `_airbyte_meta` and `_airbyte_generation_id` to final tables created
/// before those columns existed.
///
/// Only the missing metadata columns are added; every other column is left as
/// it is for the regular schema evolution to handle.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetaColumnsMigration;

const REQUIRED: [&str; 2] = [COLUMN_META, COLUMN_GENERATION_ID];

#[async_trait]
impl<D: TableSchemaEvolution> Migration<D> for MetaColumnsMigration {
    fn name(&self) -> &'static str {
        "meta_columns"
    }

    async fn migrate_if_necessary(
        &self,
        destination: &D,
        config: &StreamConfig,
        status: &InitialStatus,
    ) -> Result<MigrationResult> {
        let present = DestinationState {
            meta_columns_present: true,
            ..status.destination_state.clone()
        };
        if !status.final_table_exists {
            // Tables are always created with every metadata column.
            return Ok(MigrationResult::unchanged(present));
        }

        let table = &config.final_table;
        let (actual, actual_info) = destination
            .discover_schema(table)
            .await?
            .with_context(|| format!("Table {table} disappeared during migration"))?;

        let missing: Vec<&str> = REQUIRED
            .into_iter()
            .filter(|c| !actual.contains(c))
            .collect();
        if missing.is_empty() {
            return Ok(MigrationResult::unchanged(present));
        }

        let (computed, _) = destination.compute_schema(&config.stream, &config.column_mapping);
        let mut expected = actual.clone();
        let mut columns_to_add = BTreeMap::new();
        for column in &missing {
            let column_type = computed
                .get(column)
                .cloned()
                .with_context(|| format!("Backend does not declare metadata column {column}"))?;
            expected.insert(*column, column_type.clone());
            columns_to_add.insert(column.to_string(), column_type);
        }
        let diff = TableSchemaDiff {
            columns_to_add,
            columns_to_retain: actual.column_names().into_iter().map(str::to_string).collect(),
            ..Default::default()
        };

        tracing::info!("Adding metadata columns {:?} to {}", missing, table);
        let info_diff = destination.diff_additional_info(&actual_info, &actual_info);
        destination
            .apply_schema_diff(&config.stream, table, &expected, &actual_info, &diff, &info_diff)
            .await?;

        Ok(MigrationResult {
            state: present,
            force_refetch: true,
        })
    }
}
