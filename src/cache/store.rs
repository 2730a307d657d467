//! Artifact store trait and the filesystem backend

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Byte store for persisted feature artifacts.
///
/// Keys are relative, `/`-separated paths such as
/// `processed/gin/train.json`, prefixed with the dataset name unless the
/// store is [dataset scoped](ArtifactStore::dataset_scoped).
/// Implementations must be safe to share between threads.
pub trait ArtifactStore: Send + Sync {
    /// Get the bytes stored under a key.
    ///
    /// Returns `None` if the key doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheIo`] if a present value cannot be read.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store bytes under a key, overwriting any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheIo`] if the value cannot be written.
    fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Delete a key. No-op if the key doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheIo`] if removal fails.
    fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheIo`] if existence cannot be determined.
    fn exists(&self, key: &str) -> Result<bool>;

    /// File extension appended after `.json` for encoded artifacts.
    fn suffix(&self) -> Option<&'static str> {
        None
    }

    /// Whether the store holds a single dataset's artifacts.
    ///
    /// Stores shared between datasets return `false` and receive keys
    /// prefixed with the dataset name.
    fn dataset_scoped(&self) -> bool {
        false
    }
}

impl<T: ArtifactStore + ?Sized> ArtifactStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        (**self).exists(key)
    }

    fn suffix(&self) -> Option<&'static str> {
        (**self).suffix()
    }

    fn dataset_scoped(&self) -> bool {
        (**self).dataset_scoped()
    }
}

/// Store rooted at one dataset directory; one file per key.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a key.
    #[must_use]
    pub fn path_of(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

fn cache_io(key: &str, e: &std::io::Error) -> Error {
    Error::CacheIo {
        path: key.to_string(),
        reason: e.to_string(),
    }
}

impl ArtifactStore for FsArtifactStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path_of(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(cache_io(key, &e)),
        }
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let path = self.path_of(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| cache_io(key, &e))?;
        }
        // Readers never observe a half-written artifact.
        let tmp = path.with_extension("partial");
        fs::write(&tmp, value).map_err(|e| cache_io(key, &e))?;
        fs::rename(&tmp, &path).map_err(|e| cache_io(key, &e))
    }

    fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_of(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(cache_io(key, &e)),
        }
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.path_of(key).is_file())
    }

    fn dataset_scoped(&self) -> bool {
        true
    }
}
