use anyhow::Result;
use async_trait::async_trait;
use sync_core::{DestinationState, InitialStatus, StreamConfig};
use table_operations::TableSchemaEvolution;

use crate::migration::{Migration, MigrationResult};

/// Upgrades the legacy single-table layout.
///
/// Older destinations kept every stream in `_airbyte_raw_<name>`. When such a
/// table exists and the final table holds no rows yet, the legacy rows are
/// copied into the temp table, which then atomically replaces the final table.
/// An interrupted attempt leaves the final table absent or empty, so the next
/// run starts over. The legacy table is kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyRawTableMigration;

#[async_trait]
impl<D: TableSchemaEvolution> Migration<D> for LegacyRawTableMigration {
    fn name(&self) -> &'static str {
        "legacy_raw_table"
    }

    async fn migrate_if_necessary(
        &self,
        destination: &D,
        config: &StreamConfig,
        status: &InitialStatus,
    ) -> Result<MigrationResult> {
        let state = status.destination_state.clone();
        if state.legacy_layout_migrated || status.final_table_has_rows() {
            return Ok(MigrationResult::unchanged(state));
        }

        let legacy = config.final_table.legacy_raw_table();
        if !destination.table_exists(&legacy).await? {
            return Ok(MigrationResult::unchanged(state));
        }

        let temp = config.final_table.temp_table();
        tracing::info!(
            "Copying legacy raw table {} into {} for stream {}",
            legacy,
            config.final_table,
            config.id()
        );
        destination
            .create_table(&config.stream, &temp, &config.column_mapping, true)
            .await?;
        destination
            .copy_table(&config.column_mapping, &legacy, &temp)
            .await?;
        destination.overwrite_table(&temp, &config.final_table).await?;

        Ok(MigrationResult {
            state: DestinationState {
                legacy_layout_migrated: true,
                ..state
            },
            force_refetch: true,
        })
    }
}
