//! Backbone-specific feature extraction
//!
//! Each backbone family consumes a different view of a molecule:
//!
//! | Backbone     | Extractor                | Feature          |
//! |--------------|--------------------------|------------------|
//! | `DNN-rdkit`  | [`DescriptorExtractor`]  | `Dense`          |
//! | `DNN-morgan` | [`MorganExtractor`]      | `Bits`           |
//! | `ChemBERTa`  | [`TokenExtractor`]       | `Tokens`         |
//! | `GIN`        | [`GraphExtractor`]       | `Graph`          |
//! | `Uni-Mol`    | [`ConformationExtractor`]| `Conformation`   |
//!
//! Extractors are stateless after construction (`Send + Sync`), so the
//! feature cache can run them on any number of worker threads.

mod conformer;
mod descriptors;
mod fingerprint;
mod graph;
mod tokens;

pub use conformer::{ConformationExtractor, Conformer, DEFAULT_MAX_ATOMS};
pub use descriptors::{DescriptorExtractor, DESCRIPTOR_NAMES};
pub use fingerprint::{MorganExtractor, DEFAULT_N_BITS, DEFAULT_RADIUS};
pub use graph::{GraphExtractor, DEFAULT_MAX_ATOMIC_NUM};
pub use tokens::{token_id, TokenExtractor, BOS_ID, DEFAULT_MAX_LENGTH, EOS_ID, PAD_ID, UNK_ID};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::dataset::Record;
use crate::smiles::SmilesError;
use crate::{Error, Result};

/// Why a single record's feature could not be derived
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerivationError {
    /// SMILES could not be parsed
    #[error("unparseable SMILES: {0}")]
    Smiles(#[from] SmilesError),

    /// 3D geometry unavailable or unusable
    #[error("conformation failure: {0}")]
    Geometry(String),

    /// Molecule outside what the backbone supports
    #[error("unsupported molecule: {0}")]
    Unsupported(String),
}

/// Derived feature of one molecule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Feature {
    /// Dense real-valued vector
    Dense {
        /// Vector entries
        values: Vec<f32>,
    },
    /// Sparse bit vector
    Bits {
        /// Vector length
        n_bits: u32,
        /// Indices of set bits, ascending
        on: Vec<u32>,
    },
    /// Token id sequence
    Tokens {
        /// Vocabulary ids
        ids: Vec<u32>,
    },
    /// Molecular graph
    Graph {
        /// Per atom: `[atomic number, chirality]`
        atom_features: Vec<[u32; 2]>,
        /// Directed edges, both directions per bond
        edge_index: Vec<[u32; 2]>,
        /// Bond type per directed edge
        edge_features: Vec<u32>,
    },
    /// Atom symbols with 3D coordinates
    Conformation(Conformer),
}

/// Cached outcome for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeatureEntry {
    /// Derivation succeeded
    Valid {
        /// Derived feature
        feature: Feature,
    },
    /// Derivation failed; the record must be excluded from training
    Invalid {
        /// Failure description
        reason: String,
    },
}

impl FeatureEntry {
    /// Whether the record carries a usable feature.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// The feature, if valid.
    #[must_use]
    pub const fn feature(&self) -> Option<&Feature> {
        match self {
            Self::Valid { feature } => Some(feature),
            Self::Invalid { .. } => None,
        }
    }
}

/// Per-record feature derivation for one backbone.
pub trait FeatureExtractor: Send + Sync {
    /// Identity used in cache keys (lowercase, path-safe).
    fn backbone_id(&self) -> &str;

    /// Derive the feature for one record.
    ///
    /// # Errors
    ///
    /// Returns [`DerivationError`] if the record cannot be featurized.
    fn extract(&self, record: &Record) -> std::result::Result<Feature, DerivationError>;

    /// Hash of the settings that shape derived features.
    ///
    /// Artifacts record it; a cached artifact derived under different
    /// settings is stale. Extractors without settings keep the default.
    fn config_fingerprint(&self) -> u64 {
        0
    }
}

/// Molecular representation model the features are derived for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Backbone {
    /// Fully connected network on RDKit-style descriptors
    #[serde(rename = "DNN-rdkit")]
    DnnRdkit,
    /// Fully connected network on Morgan fingerprints
    #[serde(rename = "DNN-morgan")]
    DnnMorgan,
    /// SMILES transformer
    #[serde(rename = "ChemBERTa")]
    ChemBerta,
    /// Graph isomorphism network
    #[serde(rename = "GIN")]
    Gin,
    /// 3D conformation transformer
    #[serde(rename = "Uni-Mol")]
    UniMol,
}

impl Backbone {
    /// All backbones.
    pub const ALL: [Self; 5] = [
        Self::DnnRdkit,
        Self::DnnMorgan,
        Self::ChemBerta,
        Self::Gin,
        Self::UniMol,
    ];

    /// Lowercase path-safe identity.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::DnnRdkit => "dnn-rdkit",
            Self::DnnMorgan => "dnn-morgan",
            Self::ChemBerta => "chemberta",
            Self::Gin => "gin",
            Self::UniMol => "unimol",
        }
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DnnRdkit => "DNN-rdkit",
            Self::DnnMorgan => "DNN-morgan",
            Self::ChemBerta => "ChemBERTa",
            Self::Gin => "GIN",
            Self::UniMol => "Uni-Mol",
        }
    }

    /// Resolve a backbone from a model name and, for `DNN`, a feature type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for unknown names or a `DNN` without
    /// a usable feature type.
    pub fn from_model(model_name: &str, feature_type: Option<&str>) -> Result<Self> {
        match (model_name, feature_type) {
            ("DNN", Some("rdkit")) => Ok(Self::DnnRdkit),
            ("DNN", Some("morgan")) => Ok(Self::DnnMorgan),
            ("DNN", other) => Err(Error::InvalidConfig(format!(
                "`feature_type` is required for DNN and must be rdkit or morgan, got {other:?}"
            ))),
            ("ChemBERTa", _) => Ok(Self::ChemBerta),
            ("GIN", _) => Ok(Self::Gin),
            ("UniMol" | "Uni-Mol", _) => Ok(Self::UniMol),
            (other, _) => Err(Error::InvalidConfig(format!("unknown model name '{other}'"))),
        }
    }

    /// Default extractor for this backbone.
    ///
    /// The conformation extractor has no source conformations and generates
    /// geometry for every molecule; use
    /// [`ConformationExtractor::with_lookup`] to reuse supplied ones.
    #[must_use]
    pub fn extractor(self) -> Box<dyn FeatureExtractor> {
        match self {
            Self::DnnRdkit => Box::new(DescriptorExtractor::new()),
            Self::DnnMorgan => Box::new(MorganExtractor::default()),
            Self::ChemBerta => Box::new(TokenExtractor::default()),
            Self::Gin => Box::new(GraphExtractor::default()),
            Self::UniMol => Box::new(ConformationExtractor::default()),
        }
    }
}

impl fmt::Display for Backbone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backbone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|b| b.id() == s || b.name() == s)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown backbone '{s}'")))
    }
}
