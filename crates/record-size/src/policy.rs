use crate::enforce::{enforce, Enforced};
use serde::{Deserialize, Serialize};
use sync_core::{DestinationStream, Record, SyncError};

/// Byte limits of a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizePolicy {
    /// Hard ceiling on a record's serialized size
    pub max_record_bytes: usize,

    /// Leaves strictly larger than this may be nulled
    pub large_field_bytes: usize,
}

impl Default for SizePolicy {
    fn default() -> Self {
        Self {
            max_record_bytes: 16 * 1024 * 1024,
            large_field_bytes: 1024 * 1024,
        }
    }
}

impl SizePolicy {
    pub fn new(max_record_bytes: usize, large_field_bytes: usize) -> Self {
        Self {
            max_record_bytes,
            large_field_bytes,
        }
    }

    pub fn apply(&self, record: Record, stream: &DestinationStream) -> Result<Enforced, SyncError> {
        let threshold = self.large_field_bytes;
        enforce(record, self.max_record_bytes, |len| len > threshold, stream)
    }
}
