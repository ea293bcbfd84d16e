//! Run-scoped key/value scratchpad shared by every node of one run.

use crate::error::AgentError;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Values are kept as JSON so the whole map can be written into a checkpoint
/// and restored verbatim in another process.
#[derive(Debug, Clone, Default)]
pub struct SessionKv {
    inner: Arc<RwLock<BTreeMap<String, serde_json::Value>>>,
}

impl SessionKv {
    /// Fresh, empty container for a new run.
    pub fn init() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(snapshot)),
        }
    }

    /// Merge `entries`, overwriting existing keys.
    pub fn append<I, K, V>(&self, entries: I) -> Result<(), AgentError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Serialize,
    {
        let encoded = entries
            .into_iter()
            .map(|(k, v)| Ok((k.into(), serde_json::to_value(v)?)))
            .collect::<Result<Vec<_>, AgentError>>()?;

        let mut map = self.inner.write();
        for (key, value) in encoded {
            map.insert(key, value);
        }
        Ok(())
    }

    pub fn insert<V: Serialize>(&self, key: impl Into<String>, value: V) -> Result<(), AgentError> {
        self.append([(key.into(), value)])
    }

    /// Typed read. A missing key and a value of another shape both yield `None`.
    pub fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.inner.read().get(key).cloned()?;
        serde_json::from_value(value).ok()
    }

    pub fn get_value(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.read().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.write().remove(key)
    }

    pub fn snapshot(&self) -> BTreeMap<String, serde_json::Value> {
        self.inner.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
