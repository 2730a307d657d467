//! Molecular graphs for the `GIN` backbone

use super::{DerivationError, Feature, FeatureExtractor};
use crate::dataset::Record;
use crate::smiles::Molecule;

/// Largest atomic number the pre-trained embedding table covers
pub const DEFAULT_MAX_ATOMIC_NUM: u8 = 100;

/// Converts molecules into atom/edge feature lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphExtractor {
    max_atomic_num: u8,
}

impl Default for GraphExtractor {
    fn default() -> Self {
        Self {
            max_atomic_num: DEFAULT_MAX_ATOMIC_NUM,
        }
    }
}

impl GraphExtractor {
    /// Create an extractor with a custom atomic number ceiling.
    #[must_use]
    pub const fn new(max_atomic_num: u8) -> Self {
        Self { max_atomic_num }
    }
}

impl FeatureExtractor for GraphExtractor {
    fn backbone_id(&self) -> &str {
        "gin"
    }

    #[allow(clippy::cast_possible_truncation)]
    fn extract(&self, record: &Record) -> Result<Feature, DerivationError> {
        let mol = Molecule::parse(&record.smiles)?;

        let atom_features = mol
            .atoms()
            .iter()
            .map(|atom| {
                let number = atom.element().number;
                if number > self.max_atomic_num {
                    return Err(DerivationError::Unsupported(format!(
                        "atomic number {number} exceeds {}",
                        self.max_atomic_num
                    )));
                }
                Ok([u32::from(number), atom.spec.chirality.index()])
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut edge_index = Vec::with_capacity(mol.bonds().len() * 2);
        let mut edge_features = Vec::with_capacity(mol.bonds().len() * 2);
        for bond in mol.bonds() {
            let (a, b) = (bond.a as u32, bond.b as u32);
            edge_index.push([a, b]);
            edge_index.push([b, a]);
            edge_features.push(bond.order.index());
            edge_features.push(bond.order.index());
        }

        Ok(Feature::Graph {
            atom_features,
            edge_index,
            edge_features,
        })
    }

    fn config_fingerprint(&self) -> u64 {
        u64::from(self.max_atomic_num)
    }
}
