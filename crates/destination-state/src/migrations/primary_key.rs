use anyhow::Result;
use async_trait::async_trait;
use sync_core::{InitialStatus, PrimaryKeyDiff, StreamConfig};
use table_operations::TableSchemaEvolution;

use crate::migration::{Migration, MigrationResult};

/// Schedules a soft reset when a dedupe stream's primary key changed.
///
/// Rows already in the final table were deduplicated on the old key, so they
/// are re-deduplicated at the next finalize. The declared key is stored for
/// the next comparison.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrimaryKeyChangeMigration;

#[async_trait]
impl<D: TableSchemaEvolution> Migration<D> for PrimaryKeyChangeMigration {
    fn name(&self) -> &'static str {
        "primary_key_change"
    }

    async fn migrate_if_necessary(
        &self,
        _destination: &D,
        config: &StreamConfig,
        status: &InitialStatus,
    ) -> Result<MigrationResult> {
        let state = status.destination_state.clone();
        let declared = config.stream.primary_key().to_vec();

        if !config.stream.is_dedupe() {
            return Ok(MigrationResult::unchanged(state.with_primary_key(declared)));
        }

        let diff = PrimaryKeyDiff::between(&state.primary_key, &declared);
        if diff.is_noop() {
            return Ok(MigrationResult::unchanged(state));
        }

        let needs_soft_reset = state.needs_soft_reset || status.final_table_has_rows();
        if needs_soft_reset {
            tracing::info!(
                "Primary key of stream {} changed (added {:?}, removed {:?}); scheduling soft reset",
                config.id(),
                diff.columns_to_add,
                diff.columns_to_remove
            );
        }
        Ok(MigrationResult::unchanged(
            state
                .with_primary_key(declared)
                .with_soft_reset(needs_soft_reset),
        ))
    }
}
