//! Featurization run over the three splits of a configured dataset

use std::collections::HashMap;

#[cfg(feature = "compression")]
use crate::cache::CompressedArtifactStore;
use crate::cache::{ArtifactStore, FeatureArtifact, FeatureCache, FsArtifactStore};
use crate::config::PipelineConfig;
use crate::convert::load_conformations;
use crate::dataset::SplitName;
use crate::features::{Backbone, ConformationExtractor, FeatureExtractor};
use crate::storage::load_dataset;
use crate::Result;

/// Artifacts produced by [`featurize`], one per split.
#[derive(Debug, Clone)]
pub struct FeaturizeReport {
    backbone: Backbone,
    artifacts: Vec<FeatureArtifact>,
}

impl FeaturizeReport {
    /// Backbone the features were derived for.
    #[must_use]
    pub const fn backbone(&self) -> Backbone {
        self.backbone
    }

    /// Artifacts in train, valid, test order.
    #[must_use]
    pub fn artifacts(&self) -> &[FeatureArtifact] {
        &self.artifacts
    }

    /// Artifact of one split.
    #[must_use]
    pub fn artifact(&self, split: SplitName) -> Option<&FeatureArtifact> {
        self.artifacts.iter().find(|a| a.split() == split)
    }

    /// Records whose derivation failed, over all splits.
    #[must_use]
    pub fn invalid_count(&self) -> usize {
        self.artifacts
            .iter()
            .map(|a| a.len() - a.valid_count())
            .sum()
    }
}

fn open_store(config: &PipelineConfig) -> Box<dyn ArtifactStore> {
    let store = FsArtifactStore::new(config.data_dir());
    #[cfg(feature = "compression")]
    if let Some(compression) = config.compression {
        return Box::new(CompressedArtifactStore::new(store, compression));
    }
    Box::new(store)
}

fn build_extractor(config: &PipelineConfig, backbone: Backbone) -> Result<Box<dyn FeatureExtractor>> {
    match (backbone, &config.conformation_source) {
        (Backbone::UniMol, Some(source)) => {
            let mut lookup = HashMap::new();
            for split in SplitName::ALL {
                for (smiles, conformer) in load_conformations(source, split)? {
                    lookup.entry(smiles).or_insert(conformer);
                }
            }
            tracing::info!(source = %source.display(), conformers = lookup.len(), "reusing source conformations");
            Ok(Box::new(ConformationExtractor::with_lookup(lookup)))
        }
        _ => Ok(backbone.extractor()),
    }
}

/// Derive (or load) features for every split of the configured dataset.
///
/// # Errors
///
/// Returns configuration errors, dataset loading errors, and the cache's
/// [`crate::Error::CacheIo`] and [`crate::Error::StaleCache`].
pub fn featurize(config: &PipelineConfig) -> Result<FeaturizeReport> {
    config.validate()?;
    let backbone = config.backbone()?;
    let data_dir = config.data_dir();
    tracing::info!(dataset = %config.dataset_name, dir = %data_dir.display(), %backbone, "featurizing dataset");

    let dataset = load_dataset(&data_dir)?;
    let extractor = build_extractor(config, backbone)?;
    let cache = FeatureCache::new(open_store(config), config.cache_options());

    let artifacts = dataset
        .splits()
        .iter()
        .map(|split| cache.load_or_derive(&config.dataset_name, split, extractor.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    Ok(FeaturizeReport {
        backbone,
        artifacts,
    })
}
