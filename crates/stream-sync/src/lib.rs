//! Stream synchronization for table-sync
//!
//! Drives each stream of a sync through its tables:
//!
//! ```text
//! prepare   -> hybrid check, namespace, state, status, migrations
//! setup     -> create or evolve the final/temp/staging tables
//! accept    -> size enforcement, batching, inserts into the load target
//! finalize  -> merge, overwrite or soft reset, then commit state
//! ```
//!
//! `GenerationDecision` maps the `(generation_id, minimum_generation_id)` pair
//! to append or truncate-refresh semantics; `StreamLoader` is the per-stream
//! state machine and `DestinationSync` runs several of them concurrently.

mod generation;
mod loader;
mod sync;

pub use destination_state::gather_initial_status;
pub use generation::GenerationDecision;
pub use loader::{
    LoadPlan, LoaderOptions, LoaderState, Promotion, StreamLoader, StreamStatus, StreamSyncSummary,
};
pub use sync::{DestinationSync, StreamInput, StreamOutcome};
