//! Stream descriptors handed to the table-sync core by the surrounding writer.

use crate::schema::{ColumnNameMapping, TableName};
use crate::types::StreamField;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical identity of a stream as emitted by the upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId {
    /// Upstream namespace, if any
    pub namespace: Option<String>,

    /// Stream name
    pub name: String,
}

impl StreamId {
    pub fn new(namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.into(),
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// How rows of a sync land in the final table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ImportType {
    /// Rows are appended as-is.
    Append,

    /// Rows are merged by primary key.
    Dedupe {
        /// Primary-key fields (logical names)
        primary_key: Vec<String>,

        /// Cursor field ordering versions of the same key
        #[serde(default)]
        cursor: Option<String>,
    },
}

/// A stream as configured for one sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationStream {
    pub id: StreamId,

    /// Declared fields, in source order
    pub fields: Vec<StreamField>,

    pub import_type: ImportType,

    /// Generation this sync is producing
    pub generation_id: i64,

    /// Oldest generation still valid in the destination
    pub minimum_generation_id: i64,

    pub sync_id: i64,
}

impl DestinationStream {
    /// Primary-key fields; empty for append streams.
    pub fn primary_key(&self) -> &[String] {
        match &self.import_type {
            ImportType::Append => &[],
            ImportType::Dedupe { primary_key, .. } => primary_key,
        }
    }

    /// Cursor field for dedupe streams.
    pub fn cursor(&self) -> Option<&str> {
        match &self.import_type {
            ImportType::Append => None,
            ImportType::Dedupe { cursor, .. } => cursor.as_deref(),
        }
    }

    pub fn is_dedupe(&self) -> bool {
        matches!(self.import_type, ImportType::Dedupe { .. })
    }
}

/// A stream together with its resolved physical names.
///
/// The naming mapper that produces `final_table` and `column_mapping` lives
/// outside the core; the core only consumes its output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub stream: DestinationStream,
    pub final_table: TableName,
    pub column_mapping: ColumnNameMapping,
}

impl StreamConfig {
    pub fn new(
        stream: DestinationStream,
        final_table: TableName,
        column_mapping: ColumnNameMapping,
    ) -> Self {
        Self {
            stream,
            final_table,
            column_mapping,
        }
    }

    /// Config whose table and column names equal the logical ones.
    pub fn identity(stream: DestinationStream, default_namespace: &str) -> Self {
        let namespace = stream
            .id
            .namespace
            .clone()
            .unwrap_or_else(|| default_namespace.to_string());
        let final_table = TableName::new(namespace, stream.id.name.clone());
        let column_mapping = ColumnNameMapping::identity(stream.fields.iter().map(|f| f.name.clone()));
        Self::new(stream, final_table, column_mapping)
    }

    pub fn id(&self) -> &StreamId {
        &self.stream.id
    }
}
