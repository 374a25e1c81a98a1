//! Error taxonomy for table sync.
//!
//! Operations return `anyhow::Result`; these typed errors travel inside it and
//! can be recovered with `downcast_ref::<SyncError>()`.

use thiserror::Error;

/// Errors raised by the sync core itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// An existing column cannot be evolved to the expected type without data loss.
    #[error("column {column} in {table} changed type from {from} to {to} incompatibly")]
    IncompatibleSchema {
        table: String,
        column: String,
        from: String,
        to: String,
    },

    /// Record-level size fallback needs a primary key but none is declared.
    #[error("stream {stream} has no primary key; cannot null an oversized record in dedupe mode")]
    MissingPrimaryKey { stream: String },

    /// `0 < minimum_generation_id < generation_id`.
    #[error(
        "hybrid refresh is not supported: generation_id={generation_id}, minimum_generation_id={minimum_generation_id}"
    )]
    HybridRefresh {
        generation_id: i64,
        minimum_generation_id: i64,
    },

    /// A migration could not apply its change.
    #[error("migration {migration} failed for stream {stream}: {reason}")]
    MigrationFailed {
        migration: String,
        stream: String,
        reason: String,
    },

    /// A stream operation was called in the wrong state.
    #[error("cannot {operation} while stream is {from}")]
    InvalidTransition { from: String, operation: String },

    #[error("table {table} does not exist")]
    TableNotFound { table: String },
}

impl SyncError {
    /// True for configuration errors, which must not be retried.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::IncompatibleSchema { .. } | Self::MissingPrimaryKey { .. } | Self::HybridRefresh { .. }
        )
    }

    /// Find a `SyncError` anywhere in an error chain.
    pub fn find<'a>(err: &'a (dyn std::error::Error + 'static)) -> Option<&'a SyncError> {
        let mut current = Some(err);
        while let Some(e) = current {
            if let Some(sync) = e.downcast_ref::<SyncError>() {
                return Some(sync);
            }
            current = e.source();
        }
        None
    }
}
