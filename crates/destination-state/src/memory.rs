use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use sync_core::{DestinationState, StreamId};
use tokio::sync::RwLock;

use crate::store::StateStore;

/// Process-local StateStore.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    states: RwLock<HashMap<StreamId, DestinationState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn read_states(&self, streams: &[StreamId]) -> Result<HashMap<StreamId, DestinationState>> {
        let states = self.states.read().await;
        Ok(streams
            .iter()
            .map(|id| (id.clone(), states.get(id).cloned().unwrap_or_default()))
            .collect())
    }

    async fn commit_states(&self, states: &HashMap<StreamId, DestinationState>) -> Result<()> {
        let mut stored = self.states.write().await;
        for (id, state) in states {
            stored.insert(id.clone(), state.clone());
        }
        Ok(())
    }
}
