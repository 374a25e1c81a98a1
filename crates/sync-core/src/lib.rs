//! Core types for the table-sync framework.
//!
//! This crate provides the foundational types shared by every other crate:
//!
//! - [`TableSchema`] and [`diff`] - Column-level schema model and diff
//! - [`FieldType`] - Logical types a stream declares for its fields
//! - [`DestinationStream`] / [`StreamConfig`] - Stream descriptors
//! - [`Record`] / [`Change`] - Records and the alterations made to them
//! - [`DestinationState`] / [`InitialStatus`] - Migration bookkeeping
//! - [`SyncError`] - Error taxonomy
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── table-operations    (backend contract + schema evolution)
//!    ├─── record-size         (payload size enforcement)
//!    ├─── destination-state   (state stores + migrations)
//!    ├─── stream-sync         (per-stream state machine)
//!    └─── memory-destination  (in-process backend)
//! ```
//!
//! # Example
//!
//! ```rust
//! use sync_core::{ColumnType, TableSchema};
//!
//! let actual = TableSchema::new()
//!     .with_column("id", ColumnType::not_null("INTEGER"))
//!     .with_column("old_name", ColumnType::nullable("VARCHAR"));
//! let expected = TableSchema::new()
//!     .with_column("id", ColumnType::not_null("INTEGER"))
//!     .with_column("name", ColumnType::nullable("VARCHAR"));
//!
//! let diff = actual.diff(&expected);
//! assert!(diff.columns_to_add.contains_key("name"));
//! assert!(diff.columns_to_drop.contains("old_name"));
//! ```

pub mod error;
pub mod record;
pub mod schema;
pub mod state;
pub mod stream;
pub mod types;

// Re-exports for convenience
pub use error::SyncError;
pub use record::{Change, ChangeKind, ChangeReason, Meta, Record};
pub use schema::{
    diff, ColumnChange, ColumnDefinition, ColumnNameMapping, ColumnType, PrimaryKeyDiff, TableName,
    TableSchema, TableSchemaDiff,
};
pub use state::{DestinationState, InitialStatus, TempTableStatus};
pub use stream::{DestinationStream, ImportType, StreamConfig, StreamId};
pub use types::{FieldType, StreamField, ToColumnType};
