//! Pipeline configuration
//!
//! Loaded from a JSON file and passed explicitly to each entry point:
//!
//! ```json
//! {
//!   "data_folder": "data/files",
//!   "dataset_name": "bbbp",
//!   "data_seed": 0,
//!   "model_name": "DNN",
//!   "feature_type": "morgan",
//!   "num_preprocess_workers": 8
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(feature = "compression")]
use crate::cache::Compression;
use crate::cache::{CacheOptions, DEFAULT_NUM_WORKERS};
use crate::features::Backbone;
use crate::{Error, Result};

const fn default_workers() -> usize {
    DEFAULT_NUM_WORKERS
}

/// Settings for one featurization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root holding one directory per normalized dataset
    pub data_folder: PathBuf,
    /// Dataset directory name below `data_folder`
    pub dataset_name: String,
    /// Selects the `seed-<n>` subdirectory of a dataset with several random splits
    #[serde(default)]
    pub data_seed: Option<u64>,
    /// Backbone model family (`DNN`, `ChemBERTa`, `GIN`, `UniMol`)
    pub model_name: String,
    /// Feature type for `DNN` (`rdkit` or `morgan`)
    #[serde(default)]
    pub feature_type: Option<String>,
    /// Ignore cached artifacts and derive again
    #[serde(default)]
    pub ignore_preprocessed_dataset: bool,
    /// Do not persist derived artifacts
    #[serde(default)]
    pub disable_dataset_saving: bool,
    /// Worker threads for feature derivation
    #[serde(default = "default_workers")]
    pub num_preprocess_workers: usize,
    /// Foreign dataset directory whose conformations `Uni-Mol` reuses
    #[serde(default)]
    pub conformation_source: Option<PathBuf>,
    /// Artifact compression
    #[cfg(feature = "compression")]
    #[serde(default)]
    pub compression: Option<Compression>,
}

impl PipelineConfig {
    /// Create a configuration with defaults for everything but the dataset and model.
    pub fn new(
        data_folder: impl Into<PathBuf>,
        dataset_name: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            data_folder: data_folder.into(),
            dataset_name: dataset_name.into(),
            data_seed: None,
            model_name: model_name.into(),
            feature_type: None,
            ignore_preprocessed_dataset: false,
            disable_dataset_saving: false,
            num_preprocess_workers: DEFAULT_NUM_WORKERS,
            conformation_source: None,
            #[cfg(feature = "compression")]
            compression: None,
        }
    }

    /// Parse a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the text is not a valid configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse configuration: {e}")))
    }

    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::InvalidConfig`] if it cannot be parsed.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Check field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an empty dataset name, zero
    /// workers, or a model/feature-type combination without a backbone.
    pub fn validate(&self) -> Result<()> {
        if self.dataset_name.trim().is_empty() {
            return Err(Error::InvalidConfig("`dataset_name` is empty".to_string()));
        }
        if self.num_preprocess_workers == 0 {
            return Err(Error::InvalidConfig(
                "`num_preprocess_workers` must be at least 1".to_string(),
            ));
        }
        self.backbone().map(|_| ())
    }

    /// Directory of the normalized dataset, including the seed subdirectory.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        let dir = self.data_folder.join(&self.dataset_name);
        match self.data_seed {
            Some(seed) => dir.join(format!("seed-{seed}")),
            None => dir,
        }
    }

    /// Backbone selected by `model_name` and `feature_type`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for unknown combinations.
    pub fn backbone(&self) -> Result<Backbone> {
        Backbone::from_model(&self.model_name, self.feature_type.as_deref())
    }

    /// Cache options derived from this configuration.
    #[must_use]
    pub const fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            force_recompute: self.ignore_preprocessed_dataset,
            disable_saving: self.disable_dataset_saving,
            num_workers: self.num_preprocess_workers,
        }
    }
}
