//! Per-stream state machine: setup, load, finalize.

use crate::generation::GenerationDecision;
use anyhow::Result;
use destination_state::StateStore;
use record_size::SizePolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use sync_core::{InitialStatus, Record, StreamConfig, SyncError, TableName};
use table_operations::TableSchemaEvolution;

/// Lifecycle of a `StreamLoader`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    NotStarted,
    TablesPrepared,
    Loading,
    Finalized,
}

impl fmt::Display for LoaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not started",
            Self::TablesPrepared => "tables prepared",
            Self::Loading => "loading",
            Self::Finalized => "finalized",
        };
        f.write_str(s)
    }
}

/// Whether the upstream finished sending the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamStatus {
    Complete,
    Incomplete,
}

/// End-of-stream report handed to `finalize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSyncSummary {
    /// Records the caller wrote for this stream
    pub records_written: u64,
    pub status: StreamStatus,
}

impl StreamSyncSummary {
    pub fn complete(records_written: u64) -> Self {
        Self {
            records_written,
            status: StreamStatus::Complete,
        }
    }

    pub fn incomplete(records_written: u64) -> Self {
        Self {
            records_written,
            status: StreamStatus::Incomplete,
        }
    }
}

/// Loader tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Records buffered before a flush
    pub batch_size: usize,

    /// Size limits enforced on every accepted record, if any
    pub size_policy: Option<SizePolicy>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            size_policy: Some(SizePolicy::default()),
        }
    }
}

/// How loaded rows reach the final table at finalize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Promotion {
    /// Rows were written straight into the final table.
    Direct,

    /// Rows are merged from a staging table by primary key.
    Merge { staging: TableName },

    /// The final table is atomically replaced by the temp table.
    Overwrite { temp: TableName },

    /// The temp table is deduplicated into `dedup`, which then replaces the final table.
    DedupeAndOverwrite { temp: TableName, dedup: TableName },
}

/// Where a stream loads and how it is promoted, decided at setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    pub decision: GenerationDecision,

    /// Table records are inserted into
    pub target: TableName,

    pub promotion: Promotion,
}

/// Drives one stream through one sync.
///
/// Calls must follow `setup` -> `accept`/`flush` -> `finalize`; anything else
/// fails with `SyncError::InvalidTransition`. The final table is only mutated
/// by the promotion step (or directly when it holds no rows of an older
/// generation), so abandoning a loader leaves the previous data in place.
pub struct StreamLoader<'a, D, S> {
    destination: &'a D,
    store: &'a S,
    config: StreamConfig,
    status: InitialStatus,
    options: LoaderOptions,
    state: LoaderState,
    plan: Option<LoadPlan>,
    buffer: Vec<Record>,
    records_written: u64,
}

impl<'a, D, S> StreamLoader<'a, D, S>
where
    D: TableSchemaEvolution,
    S: StateStore,
{
    pub fn new(
        destination: &'a D,
        store: &'a S,
        config: StreamConfig,
        status: InitialStatus,
        options: LoaderOptions,
    ) -> Self {
        Self {
            destination,
            store,
            config,
            status,
            options,
            state: LoaderState::NotStarted,
            plan: None,
            buffer: Vec::new(),
            records_written: 0,
        }
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn plan(&self) -> Option<&LoadPlan> {
        self.plan.as_ref()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn initial_status(&self) -> &InitialStatus {
        &self.status
    }

    /// Records flushed to the destination so far.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    fn expect_state(&self, allowed: &[LoaderState], operation: &str) -> Result<(), SyncError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SyncError::InvalidTransition {
                from: self.state.to_string(),
                operation: operation.to_string(),
            })
        }
    }

    /// Create or evolve tables and pick the load plan.
    ///
    /// An invalid generation combination fails before anything is written.
    pub async fn setup(&mut self) -> Result<&LoadPlan> {
        self.expect_state(&[LoaderState::NotStarted], "set up")?;

        let decision = GenerationDecision::for_stream(&self.config.stream).require_valid()?;
        self.destination
            .create_namespace(&self.config.final_table.namespace)
            .await?;

        let plan = if decision.is_truncate() {
            self.plan_truncate(decision).await?
        } else {
            self.plan_final_table(decision).await?
        };

        tracing::info!(
            "Prepared tables for stream {} ({:?}): loading into {}",
            self.config.id(),
            plan.decision,
            plan.target
        );
        self.state = LoaderState::TablesPrepared;
        Ok(&*self.plan.insert(plan))
    }

    /// Plan that writes into the real final table, directly or via a merge.
    async fn plan_final_table(&self, decision: GenerationDecision) -> Result<LoadPlan> {
        let stream = &self.config.stream;
        let mapping = &self.config.column_mapping;
        let final_table = &self.config.final_table;

        if !self.status.final_table_exists {
            tracing::info!("Creating final table {final_table} for stream {}", stream.id);
            self.destination
                .create_table(stream, final_table, mapping, false)
                .await?;
        }

        if stream.is_dedupe() {
            let staging = final_table.temp_table();
            self.destination
                .create_table(stream, &staging, mapping, true)
                .await?;
            return Ok(LoadPlan {
                decision,
                target: staging.clone(),
                promotion: Promotion::Merge { staging },
            });
        }

        if self.status.final_table_exists && self.status.schema_mismatch {
            self.destination
                .ensure_schema_matches(stream, final_table, mapping)
                .await?;
        }
        Ok(LoadPlan {
            decision,
            target: final_table.clone(),
            promotion: Promotion::Direct,
        })
    }

    async fn plan_truncate(&self, decision: GenerationDecision) -> Result<LoadPlan> {
        let stream = &self.config.stream;
        let mapping = &self.config.column_mapping;
        let status = &self.status;

        // No rows of an older generation would be exposed by writing to the
        // final table: it is absent, empty and current, or already holds only
        // this generation from an earlier attempt.
        let final_is_safe = !status.final_table_exists
            || (status.final_table_empty && !status.schema_mismatch)
            || (!status.final_table_empty
                && status.final_generation_id >= stream.minimum_generation_id);
        if final_is_safe {
            return self.plan_final_table(decision).await;
        }

        let temp = self.config.final_table.temp_table();
        let reusable = status.temp_table.exists
            && (status.temp_table.generation_id == stream.generation_id
                || status.temp_table.generation_id == 0);
        if reusable {
            tracing::info!("Resuming stream {} into existing temp table {temp}", stream.id);
            self.destination
                .ensure_schema_matches(stream, &temp, mapping)
                .await?;
        } else {
            self.destination
                .create_table(stream, &temp, mapping, true)
                .await?;
        }

        let promotion = if stream.is_dedupe() {
            Promotion::DedupeAndOverwrite {
                temp: temp.clone(),
                dedup: self.config.final_table.dedup_table(),
            }
        } else {
            Promotion::Overwrite { temp: temp.clone() }
        };
        Ok(LoadPlan {
            decision,
            target: temp,
            promotion,
        })
    }

    /// Buffer a record, enforcing size limits; flushes when the batch is full.
    pub async fn accept(&mut self, record: Record) -> Result<()> {
        self.expect_state(
            &[LoaderState::TablesPrepared, LoaderState::Loading],
            "accept records",
        )?;
        self.state = LoaderState::Loading;

        let record = match &self.options.size_policy {
            Some(policy) => policy.apply(record, &self.config.stream)?.record,
            None => record,
        };
        self.buffer.push(record);

        if self.buffer.len() >= self.options.batch_size.max(1) {
            self.flush_buffer().await?;
        }
        Ok(())
    }

    /// Write buffered records to the load target.
    pub async fn flush(&mut self) -> Result<()> {
        self.expect_state(&[LoaderState::TablesPrepared, LoaderState::Loading], "flush")?;
        self.state = LoaderState::Loading;
        self.flush_buffer().await
    }

    async fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let target = match &self.plan {
            Some(plan) => plan.target.clone(),
            None => {
                return Err(SyncError::InvalidTransition {
                    from: self.state.to_string(),
                    operation: "flush".to_string(),
                }
                .into())
            }
        };

        let batch = std::mem::take(&mut self.buffer);
        self.destination
            .insert_records(&self.config.stream, &target, &self.config.column_mapping, &batch)
            .await?;
        self.records_written += batch.len() as u64;
        tracing::debug!(
            "Flushed batch of {} records into {} ({} total)",
            batch.len(),
            target,
            self.records_written
        );
        Ok(())
    }

    /// Flush, promote per the load plan, then persist destination state.
    ///
    /// An incomplete truncate-refresh leaves the final table untouched and the
    /// temp table in place for the next attempt.
    pub async fn finalize(&mut self, summary: StreamSyncSummary) -> Result<()> {
        self.expect_state(&[LoaderState::TablesPrepared, LoaderState::Loading], "finalize")?;
        self.flush_buffer().await?;

        let plan = match &self.plan {
            Some(plan) => plan.clone(),
            None => {
                return Err(SyncError::InvalidTransition {
                    from: self.state.to_string(),
                    operation: "finalize".to_string(),
                }
                .into())
            }
        };

        let stream = &self.config.stream;
        let mapping = &self.config.column_mapping;
        let final_table = &self.config.final_table;
        let destination = self.destination;
        let complete = summary.status == StreamStatus::Complete;
        let records = self.records_written.max(summary.records_written);
        let mut state = self.status.destination_state.clone();

        match &plan.promotion {
            Promotion::Direct => {}
            Promotion::Merge { staging } => {
                if self.status.final_table_exists && self.status.schema_mismatch {
                    destination
                        .ensure_schema_matches(stream, final_table, mapping)
                        .await?;
                }
                if records > 0 {
                    tracing::info!("Merging staged records from {staging} into {final_table}");
                    destination
                        .upsert_table(stream, mapping, staging, final_table)
                        .await?;
                } else {
                    tracing::debug!("No records to merge into {final_table}");
                }
                if complete && state.needs_soft_reset {
                    let dedup = final_table.dedup_table();
                    tracing::info!("Running soft reset of {final_table}");
                    destination.create_table(stream, &dedup, mapping, true).await?;
                    destination
                        .upsert_table(stream, mapping, final_table, &dedup)
                        .await?;
                    destination.overwrite_table(&dedup, final_table).await?;
                    state.needs_soft_reset = false;
                }
                destination.drop_table(staging).await?;
            }
            Promotion::Overwrite { temp } if complete => {
                tracing::info!("Overwriting {final_table} with {temp}");
                destination.overwrite_table(temp, final_table).await?;
                state.needs_soft_reset = false;
            }
            Promotion::DedupeAndOverwrite { temp, dedup } if complete => {
                tracing::info!("Deduplicating {temp} into {final_table}");
                destination.create_table(stream, dedup, mapping, true).await?;
                destination.upsert_table(stream, mapping, temp, dedup).await?;
                destination.overwrite_table(dedup, final_table).await?;
                destination.drop_table(temp).await?;
                state.needs_soft_reset = false;
            }
            Promotion::Overwrite { temp } | Promotion::DedupeAndOverwrite { temp, .. } => {
                tracing::info!(
                    "Stream {} incomplete; keeping {temp} for the next attempt",
                    stream.id
                );
            }
        }

        if complete {
            if !stream.is_dedupe() {
                state.needs_soft_reset = false;
            }
            state.last_generation_id = Some(stream.generation_id);
            self.store.commit_state(&stream.id, &state).await?;
        }

        tracing::info!(
            "Finalized stream {} with {} records ({:?})",
            stream.id,
            records,
            summary.status
        );
        self.status.destination_state = state;
        self.state = LoaderState::Finalized;
        Ok(())
    }
}
