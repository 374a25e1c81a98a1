//! Multi-stream driver: migrations, then one loader per stream.

use crate::generation::GenerationDecision;
use crate::loader::{LoaderOptions, StreamLoader, StreamStatus, StreamSyncSummary};
use anyhow::Result;
use destination_state::{default_migrations, gather_initial_status, run_migrations, Migration, StateStore};
use futures::future::join_all;
use sync_core::{Record, StreamConfig, StreamId};
use table_operations::TableSchemaEvolution;

/// Everything one stream contributes to a sync.
#[derive(Debug, Clone)]
pub struct StreamInput {
    pub config: StreamConfig,
    pub records: Vec<Record>,
    pub status: StreamStatus,
}

impl StreamInput {
    /// A stream whose upstream finished.
    pub fn complete(config: StreamConfig, records: Vec<Record>) -> Self {
        Self {
            config,
            records,
            status: StreamStatus::Complete,
        }
    }
}

/// Result of syncing one stream.
#[derive(Debug)]
pub struct StreamOutcome {
    pub stream: StreamId,

    /// Records written, or why the stream failed
    pub result: Result<u64>,
}

/// Syncs streams into one destination, keeping per-stream state in `store`.
pub struct DestinationSync<'a, D, S>
where
    D: TableSchemaEvolution,
{
    destination: &'a D,
    store: &'a S,
    migrations: Vec<Box<dyn Migration<D>>>,
    options: LoaderOptions,
}

impl<'a, D, S> DestinationSync<'a, D, S>
where
    D: TableSchemaEvolution,
    S: StateStore,
{
    pub fn new(destination: &'a D, store: &'a S, options: LoaderOptions) -> Self {
        Self {
            destination,
            store,
            migrations: default_migrations(),
            options,
        }
    }

    /// Replace the migrations run before each stream.
    pub fn with_migrations(mut self, migrations: Vec<Box<dyn Migration<D>>>) -> Self {
        self.migrations = migrations;
        self
    }

    /// Validate the generation pair, run migrations, and return a loader
    /// ready for `setup`.
    pub async fn prepare(&self, config: StreamConfig) -> Result<StreamLoader<'a, D, S>> {
        GenerationDecision::for_stream(&config.stream).require_valid()?;

        let destination = self.destination;
        let store = self.store;
        destination
            .create_namespace(&config.final_table.namespace)
            .await?;

        let state = store.read_state(config.id()).await?;
        let status = gather_initial_status(destination, &config, state).await?;

        let cfg = &config;
        let status = run_migrations(destination, store, &self.migrations, cfg, status, move || async move {
            let state = store.read_state(cfg.id()).await?;
            gather_initial_status(destination, cfg, state).await
        })
        .await?;

        Ok(StreamLoader::new(
            destination,
            store,
            config,
            status,
            self.options.clone(),
        ))
    }

    /// Run one stream from preparation to finalize.
    pub async fn run_stream(&self, input: StreamInput) -> Result<u64> {
        let StreamInput {
            config,
            records,
            status,
        } = input;
        let received = records.len() as u64;

        let mut loader = self.prepare(config).await?;
        loader.setup().await?;
        for record in records {
            loader.accept(record).await?;
        }
        loader
            .finalize(StreamSyncSummary {
                records_written: received,
                status,
            })
            .await?;
        Ok(loader.records_written())
    }

    /// Sync every stream concurrently; one stream failing does not stop the others.
    pub async fn sync_streams(&self, inputs: Vec<StreamInput>) -> Vec<StreamOutcome> {
        tracing::info!("Starting sync of {} streams", inputs.len());
        let runs = inputs.into_iter().map(|input| async move {
            let stream = input.config.id().clone();
            let result = self.run_stream(input).await;
            if let Err(e) = &result {
                tracing::error!("Sync of stream {stream} failed: {e:#}");
            }
            StreamOutcome { stream, result }
        });
        join_all(runs).await
    }
}
