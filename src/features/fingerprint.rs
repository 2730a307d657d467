//! Hashed circular (Morgan-style) fingerprints for the `DNN-morgan` backbone
//!
//! Atom invariants are refined `radius` times by hashing each atom's
//! identifier with its sorted neighborhood; every identifier from every
//! iteration sets one bit. `FxHasher` keeps identifiers stable across runs
//! and processes so cached fingerprints stay reproducible.

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

use super::{DerivationError, Feature, FeatureExtractor};
use crate::dataset::Record;
use crate::smiles::Molecule;

/// Default number of bits
pub const DEFAULT_N_BITS: u32 = 1024;

/// Default neighborhood radius
pub const DEFAULT_RADIUS: u32 = 2;

fn fx_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Morgan fingerprint extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MorganExtractor {
    radius: u32,
    n_bits: u32,
}

impl Default for MorganExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_RADIUS, DEFAULT_N_BITS)
    }
}

impl MorganExtractor {
    /// Create an extractor; `n_bits` is raised to at least 1.
    #[must_use]
    pub fn new(radius: u32, n_bits: u32) -> Self {
        Self {
            radius,
            n_bits: n_bits.max(1),
        }
    }

    /// Neighborhood radius.
    #[must_use]
    pub const fn radius(&self) -> u32 {
        self.radius
    }

    /// Fingerprint length.
    #[must_use]
    pub const fn n_bits(&self) -> u32 {
        self.n_bits
    }

    /// Indices of set bits for a parsed molecule, ascending and unique.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn fingerprint(&self, mol: &Molecule) -> Vec<u32> {
        let mut ids: Vec<u64> = (0..mol.atom_count())
            .map(|i| {
                let atom = &mol.atoms()[i];
                fx_hash(&(
                    atom.element().number,
                    mol.degree(i),
                    mol.total_hydrogens(i),
                    atom.spec.charge,
                    atom.spec.aromatic,
                    mol.is_ring_atom(i),
                ))
            })
            .collect();

        let mut bits: Vec<u32> = Vec::new();
        let n_bits = u64::from(self.n_bits);
        bits.extend(ids.iter().map(|id| (id % n_bits) as u32));

        for iteration in 1..=self.radius {
            ids = (0..mol.atom_count())
                .map(|i| {
                    let mut neighborhood: Vec<(u32, u64)> = mol
                        .neighbors(i)
                        .map(|(n, bond)| (bond.order.index(), ids[n]))
                        .collect();
                    neighborhood.sort_unstable();
                    fx_hash(&(iteration, ids[i], neighborhood))
                })
                .collect();
            bits.extend(ids.iter().map(|id| (id % n_bits) as u32));
        }

        bits.sort_unstable();
        bits.dedup();
        bits
    }
}

impl FeatureExtractor for MorganExtractor {
    fn backbone_id(&self) -> &str {
        "dnn-morgan"
    }

    fn extract(&self, record: &Record) -> Result<Feature, DerivationError> {
        let mol = Molecule::parse(&record.smiles)?;
        Ok(Feature::Bits {
            n_bits: self.n_bits,
            on: self.fingerprint(&mol),
        })
    }

    fn config_fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        (self.radius, self.n_bits).hash(&mut hasher);
        hasher.finish()
    }
}
