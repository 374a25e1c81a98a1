//! Filesystem-based destination state storage.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use sync_core::{DestinationState, StreamId};

use crate::store::{StateStore, StoredState};

/// Filesystem implementation of StateStore.
///
/// Stores one pretty-printed JSON document per stream in a directory.
pub struct FilesystemStateStore {
    dir: PathBuf,
}

impl FilesystemStateStore {
    /// Create a new FilesystemStateStore with the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the state file for a stream.
    pub fn path_for(&self, stream: &StreamId) -> PathBuf {
        let namespace = stream.namespace.as_deref().map(sanitize);
        let filename = match namespace {
            Some(ns) => format!("state_{ns}__{}.json", sanitize(&stream.name)),
            None => format!("state__{}.json", sanitize(&stream.name)),
        };
        self.dir.join(filename)
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl StateStore for FilesystemStateStore {
    async fn read_states(&self, streams: &[StreamId]) -> Result<HashMap<StreamId, DestinationState>> {
        let mut states = HashMap::with_capacity(streams.len());
        for id in streams {
            let path = self.path_for(id);
            let state = match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    let stored: StoredState = serde_json::from_str(&content)
                        .with_context(|| format!("Invalid state file {}", path.display()))?;
                    if &stored.stream != id {
                        // Two streams sanitized to the same file name.
                        anyhow::bail!(
                            "State file {} belongs to stream {}, not {}",
                            path.display(),
                            stored.stream,
                            id
                        );
                    }
                    stored.state
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => DestinationState::default(),
                Err(e) => return Err(e.into()),
            };
            states.insert(id.clone(), state);
        }
        Ok(states)
    }

    async fn commit_states(&self, states: &HashMap<StreamId, DestinationState>) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        for (id, state) in states {
            let path = self.path_for(id);
            let stored = StoredState::new(id.clone(), state.clone());

            // Write-then-rename so a crash never leaves a truncated document.
            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, serde_json::to_string_pretty(&stored)?).await?;
            tokio::fs::rename(&tmp, &path).await?;
            tracing::info!("Stored destination state to {}", path.display());
        }
        Ok(())
    }
}
