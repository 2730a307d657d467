//! Per-backbone feature cache
//!
//! Derived features are persisted once per `(dataset, split, backbone)` and
//! reused on later runs:
//!
//! ```text
//! <dataset_dir>/processed/<backbone-id>/<split>.json[.lz4|.zst]
//! ```
//!
//! Stores shared between datasets, such as [`MemoryArtifactStore`], prefix
//! that path with the dataset name.
//!
//! Artifacts are plain `serde_json` documents. Each one records a
//! fingerprint of the split's SMILES sequence and one of the extractor's
//! settings; loading an artifact whose fingerprints or length no longer
//! match fails with [`Error::StaleCache`] instead of returning misaligned
//! features.
//!
//! # Example
//!
//! ```rust
//! use molprop_data::cache::{CacheOptions, FeatureCache, MemoryArtifactStore};
//! use molprop_data::dataset::{Record, Split, SplitName};
//! use molprop_data::features::Backbone;
//!
//! let split = Split::new(SplitName::Train, vec![Record::new("CCO", vec![1.0])]);
//! let cache = FeatureCache::new(MemoryArtifactStore::new(), CacheOptions::default());
//! let extractor = Backbone::Gin.extractor();
//!
//! let artifact = cache.load_or_derive("bbbp", &split, extractor.as_ref())?;
//! assert_eq!(artifact.len(), 1);
//! assert!(cache.is_cached("bbbp", SplitName::Train, "gin")?);
//! # Ok::<(), molprop_data::Error>(())
//! ```

#[cfg(feature = "compression")]
mod compressed;
mod memory;
mod store;

#[cfg(feature = "compression")]
pub use compressed::{CompressedArtifactStore, Compression};
pub use memory::MemoryArtifactStore;
pub use store::{ArtifactStore, FsArtifactStore};

use rayon::prelude::*;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use crate::dataset::{Split, SplitName};
use crate::features::{FeatureEntry, FeatureExtractor};
use crate::{Error, Result};

/// Directory below the dataset root holding all artifacts
pub const PROCESSED_DIR: &str = "processed";

/// Default worker count for feature derivation
pub const DEFAULT_NUM_WORKERS: usize = 8;

/// Identity of one cached artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    dataset: String,
    split: SplitName,
    backbone: String,
}

impl CacheKey {
    /// Create a key.
    pub fn new(dataset: impl Into<String>, split: SplitName, backbone: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            split,
            backbone: backbone.into(),
        }
    }

    /// Dataset name.
    #[must_use]
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Split name.
    #[must_use]
    pub const fn split(&self) -> SplitName {
        self.split
    }

    /// Backbone identity.
    #[must_use]
    pub fn backbone(&self) -> &str {
        &self.backbone
    }

    /// Artifact path relative to the dataset directory.
    #[must_use]
    pub fn relative_path(&self, suffix: Option<&str>) -> String {
        let base = format!("{PROCESSED_DIR}/{}/{}.json", self.backbone, self.split);
        match suffix {
            Some(ext) => format!("{base}.{ext}"),
            None => base,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.dataset, self.split, self.backbone)
    }
}

/// Fingerprint of a split's SMILES sequence, hex-encoded.
#[must_use]
pub fn source_fingerprint(split: &Split) -> String {
    let mut hasher = FxHasher::default();
    split.len().hash(&mut hasher);
    for smiles in split.smiles() {
        smiles.hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}

fn extractor_fingerprint(extractor: &dyn FeatureExtractor) -> String {
    format!("{:016x}", extractor.config_fingerprint())
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("extractor panicked: {message}")
}

/// Persisted features of one split for one backbone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureArtifact {
    backbone: String,
    split: SplitName,
    source_fingerprint: String,
    #[serde(default)]
    extractor_fingerprint: String,
    entries: Vec<FeatureEntry>,
}

impl FeatureArtifact {
    /// Backbone identity the features were derived for.
    #[must_use]
    pub fn backbone(&self) -> &str {
        &self.backbone
    }

    /// Split the features belong to.
    #[must_use]
    pub const fn split(&self) -> SplitName {
        self.split
    }

    /// Fingerprint of the source SMILES sequence.
    #[must_use]
    pub fn source_fingerprint(&self) -> &str {
        &self.source_fingerprint
    }

    /// Fingerprint of the extractor settings the features were derived with.
    #[must_use]
    pub fn extractor_fingerprint(&self) -> &str {
        &self.extractor_fingerprint
    }

    /// One entry per record, in split order.
    #[must_use]
    pub fn entries(&self) -> &[FeatureEntry] {
        &self.entries
    }

    /// Consume the artifact, keeping its entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<FeatureEntry> {
        self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the artifact has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of usable entries.
    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_valid()).count()
    }

    /// Positions of records whose derivation failed.
    #[must_use]
    pub fn invalid_indices(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_valid())
            .map(|(i, _)| i)
            .collect()
    }

    fn check_against(
        &self,
        key: &CacheKey,
        split: &Split,
        extractor: &dyn FeatureExtractor,
    ) -> Result<()> {
        let stale = |reason: String| Error::StaleCache {
            key: key.to_string(),
            reason,
        };
        if self.backbone != key.backbone || self.split != key.split {
            return Err(stale(format!(
                "artifact belongs to {}/{}",
                self.split, self.backbone
            )));
        }
        if self.entries.len() != split.len() {
            return Err(stale(format!(
                "artifact has {} entries, split has {} records",
                self.entries.len(),
                split.len()
            )));
        }
        let current = source_fingerprint(split);
        if self.source_fingerprint != current {
            return Err(stale(format!(
                "source fingerprint {} differs from current {current}",
                self.source_fingerprint
            )));
        }
        let settings = extractor_fingerprint(extractor);
        if self.extractor_fingerprint != settings {
            return Err(stale(format!(
                "derived with extractor settings {}, current settings are {settings}",
                self.extractor_fingerprint
            )));
        }
        Ok(())
    }
}

/// Cache behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Ignore existing artifacts and derive again
    pub force_recompute: bool,
    /// Never persist derived artifacts
    pub disable_saving: bool,
    /// Worker threads used for derivation
    pub num_workers: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            force_recompute: false,
            disable_saving: false,
            num_workers: DEFAULT_NUM_WORKERS,
        }
    }
}

impl CacheOptions {
    /// Set `force_recompute`.
    #[must_use]
    pub const fn force_recompute(mut self, force: bool) -> Self {
        self.force_recompute = force;
        self
    }

    /// Set `disable_saving`.
    #[must_use]
    pub const fn disable_saving(mut self, disable: bool) -> Self {
        self.disable_saving = disable;
        self
    }

    /// Set the worker count.
    #[must_use]
    pub const fn num_workers(mut self, workers: usize) -> Self {
        self.num_workers = workers;
        self
    }
}

/// Loads feature artifacts, deriving and persisting them on a miss.
#[derive(Debug)]
pub struct FeatureCache<S: ArtifactStore> {
    store: S,
    options: CacheOptions,
}

impl<S: ArtifactStore> FeatureCache<S> {
    /// Create a cache over `store`.
    #[must_use]
    pub const fn new(store: S, options: CacheOptions) -> Self {
        Self { store, options }
    }

    /// Underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Active options.
    #[must_use]
    pub const fn options(&self) -> &CacheOptions {
        &self.options
    }

    fn store_key(&self, key: &CacheKey) -> String {
        let path = key.relative_path(self.store.suffix());
        if self.store.dataset_scoped() {
            path
        } else {
            format!("{}/{path}", key.dataset)
        }
    }

    /// Whether an artifact exists for the key.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn is_cached(&self, dataset: &str, split: SplitName, backbone: &str) -> Result<bool> {
        self.store
            .exists(&self.store_key(&CacheKey::new(dataset, split, backbone)))
    }

    /// Remove the artifact for the key, if any.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub fn invalidate(&self, dataset: &str, split: SplitName, backbone: &str) -> Result<()> {
        let key = CacheKey::new(dataset, split, backbone);
        tracing::debug!(key = %key, "invalidating feature artifact");
        self.store.delete(&self.store_key(&key))
    }

    /// Read a persisted artifact without validating it against a split.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheIo`] if the artifact cannot be read or decoded.
    pub fn load(&self, key: &CacheKey) -> Result<Option<FeatureArtifact>> {
        let path = self.store_key(key);
        let Some(bytes) = self.store.get(&path)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Error::CacheIo {
                path,
                reason: format!("Failed to decode artifact: {e}"),
            })
    }

    /// Return the features of `split` for `extractor`'s backbone.
    ///
    /// A present artifact is returned unchanged unless
    /// [`CacheOptions::force_recompute`] is set. Otherwise every record is
    /// derived on a local pool of [`CacheOptions::num_workers`] threads;
    /// records whose derivation fails or panics become
    /// [`FeatureEntry::Invalid`]. The
    /// result is persisted unless [`CacheOptions::disable_saving`] is set,
    /// and a failed write does not fail the call.
    ///
    /// # Errors
    ///
    /// - [`Error::CacheIo`] if a present artifact cannot be read or decoded
    /// - [`Error::StaleCache`] if it no longer matches `split`
    /// - [`Error::InvalidConfig`] for zero workers
    pub fn load_or_derive(
        &self,
        dataset: &str,
        split: &Split,
        extractor: &dyn FeatureExtractor,
    ) -> Result<FeatureArtifact> {
        let key = CacheKey::new(dataset, split.name(), extractor.backbone_id());

        if !self.options.force_recompute {
            if let Some(artifact) = self.load(&key)? {
                artifact.check_against(&key, split, extractor)?;
                tracing::info!(key = %key, entries = artifact.len(), "loaded cached features");
                return Ok(artifact);
            }
        }

        let artifact = self.derive(&key, split, extractor)?;

        if self.options.disable_saving {
            tracing::debug!(key = %key, "artifact saving disabled");
        } else if let Err(e) = self.persist(&key, &artifact) {
            tracing::warn!(key = %key, error = %e, "failed to persist features; returning computed result");
        }
        Ok(artifact)
    }

    fn derive(
        &self,
        key: &CacheKey,
        split: &Split,
        extractor: &dyn FeatureExtractor,
    ) -> Result<FeatureArtifact> {
        if self.options.num_workers == 0 {
            return Err(Error::InvalidConfig(
                "num_workers must be at least 1".to_string(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.num_workers)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create thread pool: {e}")))?;

        let start = Instant::now();
        let entries: Vec<FeatureEntry> = pool.install(|| {
            split
                .records()
                .par_iter()
                .enumerate()
                .map(|(index, record)| {
                    let reason =
                        match panic::catch_unwind(AssertUnwindSafe(|| extractor.extract(record))) {
                            Ok(Ok(feature)) => return FeatureEntry::Valid { feature },
                            Ok(Err(e)) => e.to_string(),
                            Err(payload) => panic_reason(payload.as_ref()),
                        };
                    let err = Error::RecordDerivation {
                        index,
                        reason: reason.clone(),
                    };
                    tracing::warn!(key = %key, smiles = %record.smiles, "{err}");
                    FeatureEntry::Invalid { reason }
                })
                .collect()
        });

        let invalid = entries.iter().filter(|e| !e.is_valid()).count();
        tracing::info!(
            key = %key,
            records = entries.len(),
            invalid,
            elapsed_ms = start.elapsed().as_millis(),
            "derived features"
        );

        Ok(FeatureArtifact {
            backbone: key.backbone.clone(),
            split: key.split,
            source_fingerprint: source_fingerprint(split),
            extractor_fingerprint: extractor_fingerprint(extractor),
            entries,
        })
    }

    fn persist(&self, key: &CacheKey, artifact: &FeatureArtifact) -> Result<()> {
        let bytes = serde_json::to_vec(artifact)?;
        let path = self.store_key(key);
        self.store.set(&path, bytes)?;
        tracing::debug!(path = %path, "persisted feature artifact");
        Ok(())
    }
}
