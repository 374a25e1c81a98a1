//! TableSync Library
//!
//! The table-synchronization core of a destination connector: it keeps
//! destination tables in step with the streams an upstream source emits.
//!
//! # Features
//!
//! - Schema evolution: diff the live table against the expected one and apply the delta
//! - Generation-aware loads: incremental appends, merges and truncate-refreshes
//! - Crash safety: truncate-refresh loads into a temp table promoted atomically
//! - Migrations: versioned, idempotent upgrades of older destinations
//! - Payload size enforcement: oversized records are trimmed and annotated
//!
//! # Crates
//!
//! - `sync_core` - Schemas, streams, records, destination state and errors
//! - `table_operations` - Backend contract and schema evolution orchestration
//! - `record_size` - Payload size enforcer
//! - `destination_state` - State stores, initial status and migrations
//! - `stream_sync` - Per-stream state machine and multi-stream driver
//! - `memory_destination` - In-process reference backend
//!
//! # Usage
//!
//! ```no_run
//! use memory_destination::MemoryDestination;
//! use table_sync::{DestinationSync, InMemoryStateStore, StreamInput, SyncOpts};
//!
//! # async fn run(input: StreamInput) -> anyhow::Result<()> {
//! table_sync::init_tracing();
//! let opts = SyncOpts::default();
//! let destination = MemoryDestination::new();
//! let store = InMemoryStateStore::new();
//! let sync = DestinationSync::new(&destination, &store, opts.loader_options());
//! for outcome in sync.sync_streams(vec![input]).await {
//!     println!("{}: {:?}", outcome.stream, outcome.result);
//! }
//! # Ok(())
//! # }
//! ```

use clap::Args;
use serde::Deserialize;
use std::path::PathBuf;

pub use destination_state::{FilesystemStateStore, InMemoryStateStore, StateStore};
pub use record_size::SizePolicy;
pub use stream_sync::{
    DestinationSync, GenerationDecision, LoaderOptions, StreamInput, StreamLoader, StreamOutcome,
    StreamStatus, StreamSyncSummary,
};
pub use sync_core::{DestinationStream, Record, StreamConfig, SyncError};
pub use table_operations::{TableOperations, TableSchemaEvolution};

/// Tuning shared by every stream of a sync.
#[derive(Args, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncOpts {
    /// Records buffered per stream before a flush
    #[arg(long, default_value = "10000", env = "TABLE_SYNC_BATCH_SIZE")]
    pub batch_size: usize,

    /// Largest serialized record the destination accepts, in bytes
    #[arg(long, default_value = "16777216", env = "TABLE_SYNC_MAX_RECORD_BYTES")]
    pub max_record_bytes: usize,

    /// Fields larger than this may be nulled to fit a record, in bytes
    #[arg(long, default_value = "1048576", env = "TABLE_SYNC_LARGE_FIELD_BYTES")]
    pub large_field_bytes: usize,

    /// Directory for destination state; kept in memory when unset
    #[arg(long, env = "TABLE_SYNC_STATE_DIR")]
    pub state_dir: Option<PathBuf>,
}

impl Default for SyncOpts {
    fn default() -> Self {
        let size = SizePolicy::default();
        Self {
            batch_size: LoaderOptions::default().batch_size,
            max_record_bytes: size.max_record_bytes,
            large_field_bytes: size.large_field_bytes,
            state_dir: None,
        }
    }
}

impl SyncOpts {
    pub fn size_limit(&self) -> SizePolicy {
        SizePolicy::new(self.max_record_bytes, self.large_field_bytes)
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            batch_size: self.batch_size,
            size_policy: Some(self.size_limit()),
        }
    }

    /// Filesystem state store rooted at `state_dir`, if one is configured.
    pub fn filesystem_store(&self) -> Option<FilesystemStateStore> {
        let dir = self.state_dir.clone()?;
        tracing::debug!("Using filesystem state store at {}", dir.display());
        Some(FilesystemStateStore::new(dir))
    }
}

/// Install the global `tracing` subscriber, filtered by `RUST_LOG`.
///
/// Panics if a subscriber is already installed; use `try_init_tracing` where
/// that may happen.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

/// Like `init_tracing`, but ignores an already installed subscriber.
pub fn try_init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
