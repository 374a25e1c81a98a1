//! Generation-id protocol.
//!
//! Each sync carries `generation_id` (what it produces) and
//! `minimum_generation_id` (oldest generation still valid). Their relation
//! decides, once per stream, how the final table is written.

use sync_core::{DestinationStream, SyncError};

/// How a stream's sync treats existing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationDecision {
    /// `minimum_generation_id == 0`: incremental; existing rows stay valid.
    Append,

    /// `minimum_generation_id == generation_id > 0`: every older row is invalid.
    TruncateRefresh,

    /// Any other combination; cannot be honored.
    InvalidHybrid {
        generation_id: i64,
        minimum_generation_id: i64,
    },
}

impl GenerationDecision {
    pub fn decide(generation_id: i64, minimum_generation_id: i64) -> Self {
        if minimum_generation_id == 0 {
            Self::Append
        } else if minimum_generation_id == generation_id && generation_id > 0 {
            Self::TruncateRefresh
        } else {
            Self::InvalidHybrid {
                generation_id,
                minimum_generation_id,
            }
        }
    }

    pub fn for_stream(stream: &DestinationStream) -> Self {
        Self::decide(stream.generation_id, stream.minimum_generation_id)
    }

    /// Turn `InvalidHybrid` into its configuration error.
    pub fn require_valid(self) -> Result<Self, SyncError> {
        match self {
            Self::InvalidHybrid {
                generation_id,
                minimum_generation_id,
            } => Err(SyncError::HybridRefresh {
                generation_id,
                minimum_generation_id,
            }),
            valid => Ok(valid),
        }
    }

    pub fn is_truncate(&self) -> bool {
        matches!(self, Self::TruncateRefresh)
    }
}
