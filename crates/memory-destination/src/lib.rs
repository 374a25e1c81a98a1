//! In-process destination backend.
//!
//! `MemoryDestination` keeps namespaces and tables in memory and implements the
//! whole table operations contract, including schema evolution with a
//! clustering layout as its backend-specific metadata. It is the reference for
//! copy/overwrite/upsert semantics and backs the end-to-end tests.
//!
//! All tables live behind a single lock, so `overwrite_table` and
//! `apply_schema_diff` are atomic with respect to every other operation.

mod evolution;
mod merge;
mod operations;
pub mod types;
pub mod widening;

pub use evolution::{ClusteringChange, TableLayout};
pub use types::MemoryTypes;
pub use widening::{ChangeStrategy, WideningPolicy};

use anyhow::Result;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use sync_core::{SyncError, TableName, TableSchema};
use tokio::sync::{Mutex, RwLock};

/// A stored row: physical column name to value.
pub type Row = Map<String, Value>;

/// A table held in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTable {
    pub schema: TableSchema,
    pub layout: TableLayout,
    pub rows: Vec<Row>,
}

#[derive(Debug, Default)]
pub(crate) struct Catalog {
    pub namespaces: BTreeSet<String>,
    pub tables: BTreeMap<TableName, MemoryTable>,
}

impl Catalog {
    pub fn table(&self, name: &TableName) -> Result<&MemoryTable> {
        self.tables.get(name).ok_or_else(|| not_found(name))
    }

    pub fn table_mut(&mut self, name: &TableName) -> Result<&mut MemoryTable> {
        self.tables.get_mut(name).ok_or_else(|| not_found(name))
    }
}

fn not_found(name: &TableName) -> anyhow::Error {
    SyncError::TableNotFound {
        table: name.to_string(),
    }
    .into()
}

/// Operations that can be made to fail once, to simulate crashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    CreateTable,
    InsertRecords,
    OverwriteTable,
    UpsertTable,
    ApplySchemaDiff,
}

/// In-memory destination.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    catalog: RwLock<Catalog>,
    policy: WideningPolicy,
    fail_points: Mutex<Vec<FailPoint>>,
    journal: Mutex<Vec<String>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: WideningPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Make the next call of `point` fail.
    pub async fn fail_next(&self, point: FailPoint) {
        self.fail_points.lock().await.push(point);
    }

    pub(crate) async fn check_fail_point(&self, point: FailPoint) -> Result<()> {
        let mut points = self.fail_points.lock().await;
        if let Some(i) = points.iter().position(|p| *p == point) {
            points.remove(i);
            anyhow::bail!("Injected failure at {point:?}");
        }
        Ok(())
    }

    /// Mutating operations performed so far, in order.
    pub async fn journal(&self) -> Vec<String> {
        self.journal.lock().await.clone()
    }

    pub(crate) async fn record(&self, entry: String) {
        tracing::trace!("Memory destination operation: {entry}");
        self.journal.lock().await.push(entry);
    }

    /// Snapshot of a table, `None` if it does not exist.
    pub async fn read_table(&self, table: &TableName) -> Option<MemoryTable> {
        self.catalog.read().await.tables.get(table).cloned()
    }

    /// Rows of a table; empty if it does not exist.
    pub async fn rows(&self, table: &TableName) -> Vec<Row> {
        self.read_table(table).await.map(|t| t.rows).unwrap_or_default()
    }

    /// Create a table with an arbitrary schema and content, creating its namespace.
    pub async fn seed_table(&self, table: &TableName, schema: TableSchema, rows: Vec<Row>) {
        let mut catalog = self.catalog.write().await;
        catalog.namespaces.insert(table.namespace.clone());
        catalog.tables.insert(
            table.clone(),
            MemoryTable {
                schema,
                layout: TableLayout::default(),
                rows,
            },
        );
    }

    pub(crate) fn policy(&self) -> &WideningPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests;
