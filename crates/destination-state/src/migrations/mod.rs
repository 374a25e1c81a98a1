//! Built-in migrations.

mod legacy_raw;
mod meta_columns;
mod primary_key;

pub use legacy_raw::LegacyRawTableMigration;
pub use meta_columns::MetaColumnsMigration;
pub use primary_key::PrimaryKeyChangeMigration;

use crate::migration::Migration;
use table_operations::TableSchemaEvolution;

/// The built-in migrations, in the order they must run.
pub fn default_migrations<D: TableSchemaEvolution>() -> Vec<Box<dyn Migration<D>>> {
    vec![
        Box::new(LegacyRawTableMigration),
        Box::new(MetaColumnsMigration),
        Box::new(PrimaryKeyChangeMigration),
    ]
}
