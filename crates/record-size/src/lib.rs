//! Payload size enforcement.
//!
//! Destinations often cap the serialized size of a record. `enforce` brings a
//! record under such a budget by nulling values, never touching primary-key
//! fields, and records every alteration as a `Change` on the record.
//!
//! The transform is two-phase:
//!
//! 1. Field pass: leaves accepted by the "large value" predicate are nulled,
//!    largest first, until the record fits.
//! 2. Record fallback: if it still does not fit, every non-key field is nulled
//!    and the field-level changes are replaced by a single `all` change.
//!
//! Changes added here always precede changes the record already carried.
//!
//! ```rust
//! use record_size::enforce;
//! use sync_core::{DestinationStream, ImportType, Record, StreamId};
//!
//! let stream = DestinationStream {
//!     id: StreamId::new(None, "events"),
//!     fields: vec![],
//!     import_type: ImportType::Append,
//!     generation_id: 0,
//!     minimum_generation_id: 0,
//!     sync_id: 1,
//! };
//! let record = Record::from_json(serde_json::json!({"payload": "x".repeat(64)}));
//! let out = enforce(record, 32, |len| len > 16, &stream).unwrap();
//! assert_eq!(out.record.data["payload"], serde_json::Value::Null);
//! assert_eq!(out.original_bytes as i64 - out.removed_bytes, out.record.serialized_size() as i64);
//! ```

mod enforce;
mod policy;

pub use enforce::{enforce, Enforced};
pub use policy::SizePolicy;
