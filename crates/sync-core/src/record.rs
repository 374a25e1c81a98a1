//! Records flowing from the upstream source into the destination.
//!
//! A `Record` holds the field values of one upstream row plus a `Meta` block
//! listing every alteration made to it on the way (nulled fields, truncations).
//! Changes are only ever appended; their position tells who introduced them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Metadata column holding the per-row unique id.
pub const COLUMN_RAW_ID: &str = "_airbyte_raw_id";
/// Metadata column holding the extraction timestamp.
pub const COLUMN_EXTRACTED_AT: &str = "_airbyte_extracted_at";
/// Metadata column holding `{sync_id, changes}`.
pub const COLUMN_META: &str = "_airbyte_meta";
/// Metadata column holding the generation that wrote the row.
pub const COLUMN_GENERATION_ID: &str = "_airbyte_generation_id";
/// Legacy raw-table column holding the whole record as JSON.
pub const COLUMN_RAW_DATA: &str = "_airbyte_data";
/// Source column marking a CDC delete.
pub const COLUMN_CDC_DELETED_AT: &str = "_ab_cdc_deleted_at";

/// All metadata columns, in table order.
pub const META_COLUMNS: [&str; 4] = [
    COLUMN_RAW_ID,
    COLUMN_EXTRACTED_AT,
    COLUMN_META,
    COLUMN_GENERATION_ID,
];

/// Kind of alteration applied to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Nulled,
    Truncated,
}

/// Why a field was altered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeReason {
    SourceFieldSizeLimitation,
    SourceRecordSizeLimitation,
    SourceSerializationError,
    SourceRetrievalError,
    DestinationFieldSizeLimitation,
    DestinationRecordSizeLimitation,
    DestinationSerializationError,
    PlatformFieldSizeLimitation,
    PlatformRecordSizeLimitation,
}

/// One alteration of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Field path (`a.b` for nested fields, `all` for the whole record)
    pub field: String,
    pub change: ChangeKind,
    pub reason: ChangeReason,
}

impl Change {
    pub fn new(field: impl Into<String>, change: ChangeKind, reason: ChangeReason) -> Self {
        Self {
            field: field.into(),
            change,
            reason,
        }
    }
}

/// Alterations recorded against a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub changes: Vec<Change>,
}

impl Meta {
    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    /// Serialized form stored in the `_airbyte_meta` column.
    pub fn to_column_value(&self, sync_id: i64) -> Value {
        serde_json::json!({
            "sync_id": sync_id,
            "changes": self.changes,
        })
    }
}

/// One upstream row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub raw_id: Uuid,
    pub extracted_at: DateTime<Utc>,

    /// Field values keyed by logical field name
    pub data: Map<String, Value>,

    pub meta: Meta,
}

impl Record {
    /// Create a record with a fresh id, extracted now.
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            raw_id: Uuid::new_v4(),
            extracted_at: Utc::now(),
            data,
            meta: Meta::default(),
        }
    }

    /// Create a record from a JSON object; non-object values yield an empty record.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::new(map),
            _ => Self::new(Map::new()),
        }
    }

    pub fn with_extracted_at(mut self, extracted_at: DateTime<Utc>) -> Self {
        self.extracted_at = extracted_at;
        self
    }

    pub fn with_change(mut self, change: Change) -> Self {
        self.meta.push(change);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Size in bytes of the compact JSON serialization of the record's data.
    pub fn serialized_size(&self) -> usize {
        serde_json::to_vec(&self.data).map(|v| v.len()).unwrap_or(0)
    }
}

/// Size in bytes of the compact JSON serialization of a value.
pub fn serialized_len(value: &Value) -> usize {
    // Serializing a `Value` cannot fail: keys are always strings.
    serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0)
}
