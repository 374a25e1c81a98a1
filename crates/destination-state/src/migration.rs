//! Migration trait and runner.

use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use sync_core::{DestinationState, InitialStatus, StreamConfig, SyncError};
use table_operations::TableSchemaEvolution;

use crate::store::StateStore;

/// Outcome of one migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationResult {
    pub state: DestinationState,

    /// The migration changed table structure; status must be gathered again
    pub force_refetch: bool,
}

impl MigrationResult {
    /// Nothing to do; state passes through.
    pub fn unchanged(state: DestinationState) -> Self {
        Self {
            state,
            force_refetch: false,
        }
    }
}

/// A versioned, idempotent migration consulted before each sync.
///
/// Implementations must not rely on their own side effects being visible in
/// `status`; they return `force_refetch = true` instead. Running a migration
/// whose target is already satisfied is a no-op.
#[async_trait]
pub trait Migration<D: TableSchemaEvolution>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn migrate_if_necessary(
        &self,
        destination: &D,
        config: &StreamConfig,
        status: &InitialStatus,
    ) -> Result<MigrationResult>;
}

/// Run `migrations` in order for one stream, then commit the resulting state.
///
/// `refetch` gathers a fresh status after a structural migration; the state
/// carried by the runner replaces whatever state the fresh status holds. The
/// state is committed to `store` only after every migration succeeded.
pub async fn run_migrations<D, S, F, Fut>(
    destination: &D,
    store: &S,
    migrations: &[Box<dyn Migration<D>>],
    config: &StreamConfig,
    mut status: InitialStatus,
    mut refetch: F,
) -> Result<InitialStatus>
where
    D: TableSchemaEvolution,
    S: StateStore,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<InitialStatus>>,
{
    for migration in migrations {
        let name = migration.name();
        tracing::debug!("Checking migration {name} for stream {}", config.id());

        let result = migration
            .migrate_if_necessary(destination, config, &status)
            .await
            .map_err(|e| {
                let reason = format!("{e:#}");
                e.context(SyncError::MigrationFailed {
                    migration: name.to_string(),
                    stream: config.id().to_string(),
                    reason,
                })
            })?;

        if result.force_refetch {
            tracing::info!(
                "Migration {name} changed tables of stream {}; refetching status",
                config.id()
            );
            status = InitialStatus {
                destination_state: result.state,
                ..refetch().await?
            };
        } else {
            status.destination_state = result.state;
        }
    }

    store
        .commit_state(config.id(), &status.destination_state)
        .await?;
    Ok(status)
}
