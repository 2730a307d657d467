//! In-memory artifact store using `DashMap`.
//!
//! Data is lost on process restart. Used for tests and for callers that
//! only need deduplication within one run.

use super::ArtifactStore;
use crate::Result;
use dashmap::DashMap;

/// In-memory artifact store backed by a lock-free concurrent hashmap.
///
/// # Example
///
/// ```rust
/// use molprop_data::cache::{ArtifactStore, MemoryArtifactStore};
///
/// let store = MemoryArtifactStore::new();
/// store.set("bbbp/processed/gin/train.json", b"{}".to_vec())?;
/// assert!(store.exists("bbbp/processed/gin/train.json")?);
/// # Ok::<(), molprop_data::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    store: DashMap<String, Vec<u8>>,
}

impl MemoryArtifactStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Remove every artifact.
    pub fn clear(&self) {
        self.store.clear();
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.store.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.store.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.store.contains_key(key))
    }
}
