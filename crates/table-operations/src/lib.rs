//! Table operations contract for table-sync destinations.
//!
//! This crate defines the `TableOperations` trait every destination backend
//! implements, and the `TableSchemaEvolution` trait layered on top of it that
//! reconciles a live table with the schema a stream expects.
//!
//! Callers are generic over the backend, so after the process picks its
//! destination once at startup every call is statically dispatched:
//!
//! ```ignore
//! pub async fn prepare<D: TableSchemaEvolution>(dest: &D, config: &StreamConfig) -> Result<()> {
//!     dest.create_namespace(&config.final_table.namespace).await?;
//!     dest.ensure_schema_matches(&config.stream, &config.final_table, &config.column_mapping)
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod ddl;
mod evolution;
mod expected;
mod traits;

#[cfg(test)]
mod tests;

pub use evolution::{AdditionalInfoDiff, SchemaReconciliation, TableSchemaEvolution};
pub use expected::{expected_table_schema, physical_column};
pub use traits::TableOperations;
