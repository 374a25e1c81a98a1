//! Destination state management for table-sync
//!
//! Everything that runs before a stream starts loading:
//!
//! - `StateStore` persists a `DestinationState` per stream across syncs
//! - `gather_initial_status` snapshots the destination for one stream
//! - `Migration` and `run_migrations` bring old destinations up to date
//!
//! ## Storage Backends
//!
//! - `FilesystemStateStore` - One JSON document per stream
//! - `InMemoryStateStore` - Process-local, for tests and ephemeral runs
//!
//! ## Built-in Migrations
//!
//! Run in this order by `default_migrations`:
//!
//! 1. `LegacyRawTableMigration` - Copies a legacy single-table layout into the final table
//! 2. `MetaColumnsMigration` - Adds missing metadata columns
//! 3. `PrimaryKeyChangeMigration` - Schedules a soft reset when the dedupe key changed

mod filesystem;
mod memory;
mod migration;
pub mod migrations;
mod status;
pub mod store;


pub use filesystem::FilesystemStateStore;
pub use memory::InMemoryStateStore;
pub use migration::{run_migrations, Migration, MigrationResult};
pub use migrations::{
    default_migrations, LegacyRawTableMigration, MetaColumnsMigration, PrimaryKeyChangeMigration,
};
pub use status::gather_initial_status;
pub use store::{StateStore, StoredState};
