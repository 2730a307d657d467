//! Compressed artifact store wrapper
//!
//! Provides transparent LZ4/ZSTD compression for any `ArtifactStore`
//! backend. Artifacts are JSON, so both codecs shrink them considerably.

use std::fmt::Display;

use super::ArtifactStore;
use crate::{Error, Result};

/// Zstd level used for artifacts
const ZSTD_LEVEL: i32 = 3;

/// Compression algorithm for artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// LZ4 - Fast compression (default)
    #[default]
    Lz4,
    /// ZSTD - Better ratio, slower
    Zstd,
}

impl Compression {
    /// Get algorithm name as string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
        }
    }

    /// File extension of artifacts compressed with this algorithm
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Lz4 => "lz4",
            Self::Zstd => "zst",
        }
    }

    /// Encode an artifact body. Empty input stays empty.
    ///
    /// # Errors
    /// Returns [`Error::StorageError`] if the codec fails.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            _ if data.is_empty() => Ok(Vec::new()),
            Self::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
            Self::Zstd => {
                zstd::bulk::compress(data, ZSTD_LEVEL).map_err(|e| self.failure("encode", e))
            }
        }
    }

    /// Decode an artifact body written by [`Compression::compress`].
    ///
    /// # Errors
    /// Returns [`Error::StorageError`] for truncated or corrupted input.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            _ if data.is_empty() => Ok(Vec::new()),
            Self::Lz4 => {
                lz4_flex::decompress_size_prepended(data).map_err(|e| self.failure("decode", e))
            }
            Self::Zstd => zstd::decode_all(data).map_err(|e| self.failure("decode", e)),
        }
    }

    fn failure(self, operation: &str, e: impl Display) -> Error {
        Error::StorageError(format!("Failed to {operation} {} artifact: {e}", self.as_str()))
    }
}

/// Attach the artifact key to a codec failure.
fn at_key(key: &str) -> impl FnOnce(Error) -> Error + '_ {
    move |e| Error::CacheIo {
        path: key.to_string(),
        reason: e.to_string(),
    }
}

/// Compressed artifact store wrapper
///
/// Wraps any `ArtifactStore` and transparently compresses values.
/// Artifact keys gain the codec extension, e.g. `train.json.lz4`.
///
/// # Example
///
/// ```rust
/// use molprop_data::cache::{ArtifactStore, CompressedArtifactStore, Compression, MemoryArtifactStore};
///
/// let store = CompressedArtifactStore::new(MemoryArtifactStore::new(), Compression::Lz4);
/// store.set("key", vec![0u8; 10000])?;
/// assert!(store.inner().get("key")?.unwrap().len() < 10000);
/// assert_eq!(store.get("key")?, Some(vec![0u8; 10000]));
/// # Ok::<(), molprop_data::Error>(())
/// ```
#[derive(Debug)]
pub struct CompressedArtifactStore<S: ArtifactStore> {
    inner: S,
    compression: Compression,
}

impl<S: ArtifactStore> CompressedArtifactStore<S> {
    /// Create a compressed store wrapping the given store
    #[must_use]
    pub const fn new(inner: S, compression: Compression) -> Self {
        Self { inner, compression }
    }

    /// Get reference to inner store (for inspection/testing)
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Get compression algorithm
    #[must_use]
    pub const fn compression(&self) -> Compression {
        self.compression
    }
}

impl<S: ArtifactStore> ArtifactStore for CompressedArtifactStore<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner
            .get(key)?
            .map(|body| self.compression.decompress(&body).map_err(at_key(key)))
            .transpose()
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let body = self.compression.compress(&value).map_err(at_key(key))?;
        self.inner.set(key, body)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key)
    }

    fn suffix(&self) -> Option<&'static str> {
        Some(self.compression.extension())
    }

    fn dataset_scoped(&self) -> bool {
        self.inner.dataset_scoped()
    }
}
