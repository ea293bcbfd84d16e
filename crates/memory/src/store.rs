//! Checkpoint store contract and the in-process implementation.

use async_trait::async_trait;
use interlude_core::AgentError;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Version conflict on checkpoint {id}: expected {expected}, found {found}")]
    Conflict { id: String, expected: u64, found: u64 },
    #[error("Invalid checkpoint ID: {0:?}")]
    InvalidId(String),
    #[error("Unsupported checkpoint schema version {found} (expected {expected})")]
    SchemaVersion { expected: u32, found: u32 },
    #[error("Corrupted checkpoint {0}")]
    Corrupted(String),
}

impl From<StoreError> for AgentError {
    fn from(e: StoreError) -> Self {
        AgentError::Store(e.to_string())
    }
}

/// Precondition for [`CheckpointStore::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCondition {
    /// Replace whatever is stored.
    Unconditional,
    /// Replace only if the stored record still has this version. `0` means
    /// "must not exist yet".
    IfVersion(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCheckpoint {
    pub version: u64,
    pub bytes: Vec<u8>,
}

/// Durable key/value persistence of run snapshots.
///
/// A successful `set` fully replaces the previous bytes for that ID and
/// returns the new version. Versions start at 1 and increase by one per write.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<StoredCheckpoint>, StoreError>;

    async fn set(&self, id: &str, bytes: Vec<u8>, condition: WriteCondition) -> Result<u64, StoreError>;
}

pub(crate) fn validate_id(id: &str) -> Result<(), StoreError> {
    if id.is_empty() || id.contains("..") || id.contains('/') || id.contains('\\') {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}

pub(crate) fn check_condition(id: &str, current: u64, condition: WriteCondition) -> Result<(), StoreError> {
    match condition {
        WriteCondition::Unconditional => Ok(()),
        WriteCondition::IfVersion(expected) if expected == current => Ok(()),
        WriteCondition::IfVersion(expected) => Err(StoreError::Conflict {
            id: id.to_string(),
            expected,
            found: current,
        }),
    }
}

/// Map-backed store. Only suitable for single-process use.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    entries: RwLock<HashMap<String, StoredCheckpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn get(&self, id: &str) -> Result<Option<StoredCheckpoint>, StoreError> {
        validate_id(id)?;
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn set(&self, id: &str, bytes: Vec<u8>, condition: WriteCondition) -> Result<u64, StoreError> {
        validate_id(id)?;
        let mut entries = self.entries.write().await;
        let current = entries.get(id).map(|c| c.version).unwrap_or(0);
        check_condition(id, current, condition)?;

        let version = current + 1;
        entries.insert(id.to_string(), StoredCheckpoint { version, bytes });
        tracing::debug!("Stored checkpoint {} at version {}", id, version);
        Ok(version)
    }
}
