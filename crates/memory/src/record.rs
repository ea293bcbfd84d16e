use crate::store::StoreError;
use chrono::{DateTime, Utc};
use interlude_core::{AgentInput, Suspension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CHECKPOINT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Suspended,
    Completed,
}

/// Full snapshot of one run. Every write replaces the previous record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub schema_version: u32,
    pub checkpoint_id: String,
    pub status: RunStatus,
    /// Input the root agent was started with; resumes re-enter with it.
    pub input: AgentInput,
    /// Pending points and composite positions. Empty once completed.
    #[serde(default)]
    pub suspension: Suspension,
    #[serde(default)]
    pub session: BTreeMap<String, serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

impl CheckpointRecord {
    pub fn suspended(
        checkpoint_id: &str,
        input: AgentInput,
        suspension: Suspension,
        session: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            schema_version: CHECKPOINT_SCHEMA_VERSION,
            checkpoint_id: checkpoint_id.to_string(),
            status: RunStatus::Suspended,
            input,
            suspension,
            session,
            updated_at: Utc::now(),
        }
    }

    pub fn completed(
        checkpoint_id: &str,
        input: AgentInput,
        session: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            schema_version: CHECKPOINT_SCHEMA_VERSION,
            checkpoint_id: checkpoint_id.to_string(),
            status: RunStatus::Completed,
            input,
            suspension: Suspension::default(),
            session,
            updated_at: Utc::now(),
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.status == RunStatus::Suspended
    }

    pub fn encode(&self) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        let record: Self = serde_json::from_slice(bytes)?;
        if record.schema_version != CHECKPOINT_SCHEMA_VERSION {
            return Err(StoreError::SchemaVersion {
                expected: CHECKPOINT_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        Ok(record)
    }
}
