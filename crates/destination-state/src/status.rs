use anyhow::Result;
use sync_core::{DestinationState, InitialStatus, StreamConfig, TempTableStatus};
use table_operations::TableSchemaEvolution;

/// Snapshot the destination for one stream.
pub async fn gather_initial_status<D>(
    destination: &D,
    config: &StreamConfig,
    destination_state: DestinationState,
) -> Result<InitialStatus>
where
    D: TableSchemaEvolution,
{
    let final_table = &config.final_table;
    let temp = final_table.temp_table();

    let temp_table = if destination.table_exists(&temp).await? {
        TempTableStatus {
            exists: true,
            generation_id: destination.get_generation_id(&temp).await?,
        }
    } else {
        TempTableStatus::default()
    };

    let matches = destination
        .schema_matches(&config.stream, final_table, &config.column_mapping)
        .await?;

    let status = match matches {
        None => InitialStatus {
            temp_table,
            ..InitialStatus::absent(config.id().clone(), final_table.clone(), destination_state)
        },
        Some(matches) => {
            let rows = destination.count_table(final_table).await?.unwrap_or(0);
            InitialStatus {
                stream: config.id().clone(),
                final_table: final_table.clone(),
                final_table_exists: true,
                final_table_empty: rows == 0,
                schema_mismatch: !matches,
                final_generation_id: destination.get_generation_id(final_table).await?,
                temp_table,
                destination_state,
            }
        }
    };

    tracing::debug!(
        "Initial status of {}: exists={} empty={} mismatch={} temp={}",
        config.id(),
        status.final_table_exists,
        status.final_table_empty,
        status.schema_mismatch,
        status.temp_table.exists
    );
    Ok(status)
}
