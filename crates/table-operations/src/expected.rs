//! Expected table shape derived from a stream's declared fields.

use sync_core::record::{COLUMN_EXTRACTED_AT, COLUMN_GENERATION_ID, COLUMN_META, COLUMN_RAW_ID};
use sync_core::{ColumnNameMapping, DestinationStream, FieldType, TableSchema, ToColumnType};

/// Physical column name for a logical field, falling back to the logical name.
pub fn physical_column<'a>(mapping: &'a ColumnNameMapping, field: &'a str) -> &'a str {
    mapping.get(field).unwrap_or(field)
}

/// Schema a table for `stream` should have: metadata columns, then the
/// stream's fields in declaration order under their physical names.
pub fn expected_table_schema<M: ToColumnType + ?Sized>(
    mapper: &M,
    stream: &DestinationStream,
    mapping: &ColumnNameMapping,
) -> TableSchema {
    let mut schema = TableSchema::new()
        .with_column(COLUMN_RAW_ID, mapper.to_column_type(&FieldType::String, false))
        .with_column(
            COLUMN_EXTRACTED_AT,
            mapper.to_column_type(&FieldType::TimestampWithTimezone, false),
        )
        .with_column(COLUMN_META, mapper.to_column_type(&FieldType::Object, true))
        .with_column(
            COLUMN_GENERATION_ID,
            mapper.to_column_type(&FieldType::Integer, true),
        );

    for field in &stream.fields {
        schema.insert(
            physical_column(mapping, &field.name),
            mapper.to_column_type(&field.field_type, field.nullable),
        );
    }
    schema
}
