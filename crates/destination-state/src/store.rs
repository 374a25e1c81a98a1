//! Destination state storage trait and types
//!
//! This module defines the StateStore trait for backend-agnostic state
//! storage, plus the stored document format.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use sync_core::{DestinationState, StreamId};

/// State document as persisted by a store.
///
/// # File Format
///
/// ```json
/// {
///     "stream": {"namespace": "public", "name": "users"},
///     "state": {
///         "needs_soft_reset": false,
///         "meta_columns_present": true,
///         "legacy_layout_migrated": false,
///         "primary_key": ["id"],
///         "last_generation_id": 3
///     },
///     "updated_at": "2024-01-01T00:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredState {
    pub stream: StreamId,
    pub state: DestinationState,
    /// Timestamp when this state was committed
    pub updated_at: DateTime<Utc>,
}

impl StoredState {
    pub fn new(stream: StreamId, state: DestinationState) -> Self {
        Self {
            stream,
            state,
            updated_at: Utc::now(),
        }
    }
}

/// Trait for destination state storage.
///
/// Streams without stored state read as `DestinationState::default()`.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the states of the given streams.
    async fn read_states(&self, streams: &[StreamId]) -> Result<HashMap<StreamId, DestinationState>>;

    /// Persist the given states, replacing earlier ones.
    async fn commit_states(&self, states: &HashMap<StreamId, DestinationState>) -> Result<()>;

    /// Read one stream's state.
    async fn read_state(&self, stream: &StreamId) -> Result<DestinationState> {
        let mut states = self.read_states(std::slice::from_ref(stream)).await?;
        Ok(states.remove(stream).unwrap_or_default())
    }

    /// Persist one stream's state.
    async fn commit_state(&self, stream: &StreamId, state: &DestinationState) -> Result<()> {
        let states = HashMap::from([(stream.clone(), state.clone())]);
        self.commit_states(&states).await
    }
}
