//! Error types for molprop-data
//!
//! Structural and cache errors halt the current dataset; record derivation
//! errors are recovered inside the feature cache and never reach callers.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// molprop-data error types
#[derive(Error, Debug)]
pub enum Error {
    /// Foreign dataset directory is missing an expected file or subdirectory
    #[error("Dataset structure error at {}: {reason}", path.display())]
    Structural {
        /// Offending path
        path: PathBuf,
        /// What was expected there
        reason: String,
    },

    /// A foreign record could not be normalized
    #[error("Malformed record in {} line {line}: {reason}", path.display())]
    Malformed {
        /// Partition file containing the record
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// Why the record was rejected
        reason: String,
    },

    /// Feature derivation failed for a single record
    #[error("Feature derivation failed for record {index}: {reason}")]
    RecordDerivation {
        /// Position of the record in its split
        index: usize,
        /// Extractor message
        reason: String,
    },

    /// Reading or writing a persisted cache artifact failed
    #[error("Cache IO error at {path}: {reason}\nRe-run with forced recomputation to rebuild the artifact")]
    CacheIo {
        /// Artifact path (relative to the store root)
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// A persisted artifact no longer matches its source split
    #[error("Stale cache artifact {key}: {reason}\nRe-run with forced recomputation to rebuild the artifact")]
    StaleCache {
        /// Cache key display form
        key: String,
        /// Mismatch description
        reason: String,
    },

    /// Invalid input data (violated record or metadata invariant)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid pipeline configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Storage error (Parquet/Arrow)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a [`Error::Structural`] for a path that should exist
    pub fn missing(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Structural {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
