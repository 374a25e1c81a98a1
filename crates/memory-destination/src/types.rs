//! Column types of the in-memory backend.
//!
//! Type names follow PostgreSQL so rendered DDL reads naturally.

use sync_core::{ColumnType, FieldType, ToColumnType};

pub const BOOLEAN: &str = "BOOLEAN";
pub const BIGINT: &str = "BIGINT";
pub const DECIMAL: &str = "DECIMAL(38, 9)";
pub const VARCHAR: &str = "VARCHAR";
pub const DATE: &str = "DATE";
pub const TIMETZ: &str = "TIME WITH TIME ZONE";
pub const TIME: &str = "TIME";
pub const TIMESTAMPTZ: &str = "TIMESTAMP WITH TIME ZONE";
pub const TIMESTAMP: &str = "TIMESTAMP";
pub const JSONB: &str = "JSONB";

/// Type mapping of the in-memory backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryTypes;

impl ToColumnType for MemoryTypes {
    fn to_column_type(&self, field_type: &FieldType, nullable: bool) -> ColumnType {
        let type_name = match field_type {
            FieldType::Boolean => BOOLEAN,
            FieldType::Integer => BIGINT,
            FieldType::Number => DECIMAL,
            FieldType::String => VARCHAR,
            FieldType::Date => DATE,
            FieldType::TimeWithTimezone => TIMETZ,
            FieldType::TimeWithoutTimezone => TIME,
            FieldType::TimestampWithTimezone => TIMESTAMPTZ,
            FieldType::TimestampWithoutTimezone => TIMESTAMP,

            // Semi-structured types are stored as JSON
            FieldType::Object | FieldType::Array(_) | FieldType::Union(_) | FieldType::Unknown => {
                JSONB
            }
        };
        ColumnType::new(type_name, nullable)
    }
}
