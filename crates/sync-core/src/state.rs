//! Per-stream status snapshots and persisted destination state.

use crate::schema::TableName;
use crate::stream::StreamId;
use serde::{Deserialize, Serialize};

/// State persisted across syncs for one stream.
///
/// Passed by value into migrations and returned by value out of them; nothing
/// mutates a stored instance in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationState {
    /// The final table must be re-deduplicated at the next finalize
    pub needs_soft_reset: bool,

    /// Final table carries every metadata column
    pub meta_columns_present: bool,

    /// Legacy single-table layout has been copied into the final table
    pub legacy_layout_migrated: bool,

    /// Primary key the final table was last deduplicated on
    pub primary_key: Vec<String>,

    /// Generation of the last completed sync
    pub last_generation_id: Option<i64>,
}

impl DestinationState {
    pub fn with_soft_reset(self, needs_soft_reset: bool) -> Self {
        Self {
            needs_soft_reset,
            ..self
        }
    }

    pub fn with_primary_key(self, primary_key: Vec<String>) -> Self {
        Self {
            primary_key,
            ..self
        }
    }
}

/// Status of a truncate-refresh temp table left over from an earlier attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TempTableStatus {
    pub exists: bool,

    /// Generation stamped on its rows; 0 when empty or unknown
    pub generation_id: i64,
}

/// Snapshot gathered once per stream per sync attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialStatus {
    pub stream: StreamId,
    pub final_table: TableName,

    pub final_table_exists: bool,

    /// Only meaningful when the final table exists
    pub final_table_empty: bool,

    /// Live schema differs from the expected one
    pub schema_mismatch: bool,

    /// Generation on the final table's rows; 0 when empty or unknown
    pub final_generation_id: i64,

    pub temp_table: TempTableStatus,

    pub destination_state: DestinationState,
}

impl InitialStatus {
    /// Status of a stream whose final table does not exist yet.
    pub fn absent(stream: StreamId, final_table: TableName, destination_state: DestinationState) -> Self {
        Self {
            stream,
            final_table,
            final_table_exists: false,
            final_table_empty: true,
            schema_mismatch: false,
            final_generation_id: 0,
            temp_table: TempTableStatus::default(),
            destination_state,
        }
    }

    /// Final table exists and holds at least one row.
    pub fn final_table_has_rows(&self) -> bool {
        self.final_table_exists && !self.final_table_empty
    }
}
