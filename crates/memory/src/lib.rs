pub mod file_store;
pub mod record;
pub mod store;

pub use file_store::FileCheckpointStore;
pub use record::{CheckpointRecord, RunStatus, CHECKPOINT_SCHEMA_VERSION};
pub use store::{CheckpointStore, InMemoryCheckpointStore, StoreError, StoredCheckpoint, WriteCondition};
