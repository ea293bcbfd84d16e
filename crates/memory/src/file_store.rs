use crate::store::{check_condition, validate_id, CheckpointStore, StoreError, StoredCheckpoint, WriteCondition};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

const EXTENSION: &str = "ckpt";

/// One file per checkpoint ID under `base_path`.
///
/// File layout: the decimal version on the first line, the record bytes after
/// it. Writes go to a temp file and are renamed into place so a crash never
/// leaves a half-written record. The write lock serialises compare-and-swap
/// within one process; across processes the caller keeps a single writer per
/// checkpoint ID.
pub struct FileCheckpointStore {
    base_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCheckpointStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.base_path).await?;
        tracing::info!("Checkpoint store initialized at {:?}", self.base_path);
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.checkpoint_path(id)?;
        let _guard = self.write_lock.lock().await;
        if path.exists() {
            fs::remove_file(&path).await?;
            tracing::info!("Deleted checkpoint: {}", id);
        }
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(id) = name.strip_suffix(&format!(".{}", EXTENSION)) {
                    ids.push(id.to_string());
                }
            }
        }

        ids.sort();
        Ok(ids)
    }

    fn checkpoint_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        validate_id(id)?;
        Ok(self.base_path.join(format!("{}.{}", id, EXTENSION)))
    }

    async fn read(&self, id: &str, path: &Path) -> Result<Option<StoredCheckpoint>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = fs::read(path).await?;
        let split = raw
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| StoreError::Corrupted(id.to_string()))?;
        let version = std::str::from_utf8(&raw[..split])
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .ok_or_else(|| StoreError::Corrupted(id.to_string()))?;

        Ok(Some(StoredCheckpoint {
            version,
            bytes: raw[split + 1..].to_vec(),
        }))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn get(&self, id: &str) -> Result<Option<StoredCheckpoint>, StoreError> {
        let path = self.checkpoint_path(id)?;
        self.read(id, &path).await
    }

    async fn set(&self, id: &str, bytes: Vec<u8>, condition: WriteCondition) -> Result<u64, StoreError> {
        let path = self.checkpoint_path(id)?;
        let _guard = self.write_lock.lock().await;

        let current = self.read(id, &path).await?.map(|c| c.version).unwrap_or(0);
        check_condition(id, current, condition)?;
        let version = current + 1;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut content = format!("{}\n", version).into_bytes();
        content.extend_from_slice(&bytes);

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &path).await?;

        tracing::debug!("Saved checkpoint {} at version {}", id, version);
        Ok(version)
    }
}
