//! Declared field types of a stream.
//!
//! This module defines `FieldType`, the logical type universe a stream declares for
//! its fields. Each destination maps it to a physical `ColumnType` via the
//! `ToColumnType` trait.

use crate::schema::ColumnType;
use serde::{Deserialize, Serialize};

/// Logical type of a stream field, as declared by the upstream source.
///
/// # JSON Format
///
/// Simple types are plain strings:
/// ```json
/// "string"
/// "timestamp_with_timezone"
/// ```
///
/// Arrays carry their item type:
/// ```json
/// {"array": "integer"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Boolean value
    Boolean,

    /// Arbitrary precision integer
    Integer,

    /// Arbitrary precision decimal
    Number,

    /// Unbounded text
    String,

    /// Date only (YYYY-MM-DD)
    Date,

    /// Time of day with offset
    TimeWithTimezone,

    /// Time of day without offset
    TimeWithoutTimezone,

    /// Instant with offset
    TimestampWithTimezone,

    /// Local date-time
    TimestampWithoutTimezone,

    /// Nested object
    Object,

    /// Array of a given item type
    Array(Box<FieldType>),

    /// Union of several types
    Union(Vec<FieldType>),

    /// Type the source could not express; stored as JSON
    Unknown,
}

impl FieldType {
    /// Create an array type.
    pub fn array(item: FieldType) -> Self {
        Self::Array(Box::new(item))
    }

    /// True for types that are stored as semi-structured JSON rather than a scalar column.
    pub fn is_semi_structured(&self) -> bool {
        matches!(
            self,
            Self::Object | Self::Array(_) | Self::Union(_) | Self::Unknown
        )
    }
}

/// A declared stream field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamField {
    /// Logical field name
    pub name: String,

    /// Field type
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Whether the field may be null
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

impl StreamField {
    /// Create a nullable field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: true,
        }
    }

    /// Create a non-nullable field.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
        }
    }
}

/// Maps logical field types to a destination's column types.
///
/// Each destination implements this to derive its expected table schema.
pub trait ToColumnType {
    /// Physical column type for the given field type.
    fn to_column_type(&self, field_type: &FieldType, nullable: bool) -> ColumnType;
}
