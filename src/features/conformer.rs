//! 3D conformations for the `Uni-Mol` backbone
//!
//! Conformers supplied with the source data are reused verbatim. Molecules
//! without one get a coarse, deterministic geometry: atoms are walked
//! breadth-first and placed on a diamond lattice, so bonded atoms sit at
//! tetrahedral angles with order-dependent bond lengths. Ring closures are
//! not enforced. Disconnected fragments are laid out side by side.

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};

use super::{DerivationError, Feature, FeatureExtractor};
use crate::dataset::Record;
use crate::smiles::{BondOrder, Molecule};

/// Default atom limit per conformation
pub const DEFAULT_MAX_ATOMS: usize = 256;

const FRAGMENT_SPACING: f32 = 10.0;

// Unit vectors towards the corners of a regular tetrahedron
const TETRAHEDRAL: [[f32; 3]; 4] = {
    const C: f32 = 0.577_350_26;
    [[C, C, C], [C, -C, -C], [-C, C, -C], [-C, -C, C]]
};

/// Atom symbols paired with Cartesian coordinates in Ångström
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conformer {
    atoms: Vec<String>,
    coordinates: Vec<[f32; 3]>,
}

impl Conformer {
    /// Create a conformer; callers ensure both lists have equal length.
    #[must_use]
    pub const fn new(atoms: Vec<String>, coordinates: Vec<[f32; 3]>) -> Self {
        Self { atoms, coordinates }
    }

    /// Atom symbols.
    #[must_use]
    pub fn atoms(&self) -> &[String] {
        &self.atoms
    }

    /// Coordinates, one per atom.
    #[must_use]
    pub fn coordinates(&self) -> &[[f32; 3]] {
        &self.coordinates
    }

    /// Number of atoms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Whether the conformer has no atoms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    fn without_hydrogens(self) -> Self {
        let (atoms, coordinates) = self
            .atoms
            .into_iter()
            .zip(self.coordinates)
            .filter(|(symbol, _)| symbol != "H")
            .unzip();
        Self { atoms, coordinates }
    }
}

const fn bond_length(order: BondOrder) -> f32 {
    match order {
        BondOrder::Single | BondOrder::Quadruple => 1.54,
        BondOrder::Double => 1.34,
        BondOrder::Triple => 1.20,
        BondOrder::Aromatic => 1.40,
    }
}

/// Lay out a molecule on a diamond lattice.
#[allow(clippy::cast_precision_loss)]
fn generate(mol: &Molecule) -> Conformer {
    let n = mol.atom_count();
    let mut coordinates = vec![[0.0f32; 3]; n];
    // Per placed atom: lattice sign and the direction slot pointing back to its parent
    let mut placed: Vec<Option<(f32, Option<usize>)>> = vec![None; n];
    let mut fragment = 0usize;

    for root in 0..n {
        if placed[root].is_some() {
            continue;
        }
        coordinates[root] = [FRAGMENT_SPACING * fragment as f32, 0.0, 0.0];
        placed[root] = Some((1.0, None));
        fragment += 1;

        let mut queue = VecDeque::from([root]);
        while let Some(atom) = queue.pop_front() {
            let Some((sign, back)) = placed[atom] else {
                continue;
            };
            let mut free = (0..TETRAHEDRAL.len()).filter(|slot| Some(*slot) != back).cycle();
            let mut layer = 1.0f32;
            let mut used = 0usize;

            for (neighbor, bond) in mol.neighbors(atom) {
                if placed[neighbor].is_some() {
                    continue;
                }
                let Some(slot) = free.next() else {
                    break;
                };
                // Crowded centers spill onto a longer shell instead of stacking atoms.
                if used > 0 && used % (TETRAHEDRAL.len() - usize::from(back.is_some())) == 0 {
                    layer += 0.5;
                }
                used += 1;

                let step = bond_length(bond.order) * layer * sign;
                let origin = coordinates[atom];
                let dir = TETRAHEDRAL[slot];
                coordinates[neighbor] = [
                    dir[0].mul_add(step, origin[0]),
                    dir[1].mul_add(step, origin[1]),
                    dir[2].mul_add(step, origin[2]),
                ];
                placed[neighbor] = Some((-sign, Some(slot)));
                queue.push_back(neighbor);
            }
        }
    }

    let atoms = mol
        .atoms()
        .iter()
        .map(|atom| atom.element().symbol.to_string())
        .collect();
    Conformer::new(atoms, coordinates)
}

/// Supplies conformations, reusing source geometry where available.
#[derive(Debug, Clone)]
pub struct ConformationExtractor {
    lookup: HashMap<String, Conformer>,
    generate_missing: bool,
    max_atoms: usize,
    remove_hydrogens: bool,
}

impl Default for ConformationExtractor {
    fn default() -> Self {
        Self {
            lookup: HashMap::new(),
            generate_missing: true,
            max_atoms: DEFAULT_MAX_ATOMS,
            remove_hydrogens: true,
        }
    }
}

impl ConformationExtractor {
    /// Create an extractor that reuses the given conformers, keyed by SMILES.
    #[must_use]
    pub fn with_lookup(lookup: HashMap<String, Conformer>) -> Self {
        Self {
            lookup,
            ..Self::default()
        }
    }

    /// Whether molecules without a supplied conformer get generated geometry.
    #[must_use]
    pub const fn generate_missing(mut self, generate: bool) -> Self {
        self.generate_missing = generate;
        self
    }

    /// Reject conformations with more atoms than this.
    #[must_use]
    pub const fn max_atoms(mut self, max_atoms: usize) -> Self {
        self.max_atoms = max_atoms;
        self
    }

    /// Drop hydrogen atoms from the output.
    #[must_use]
    pub const fn remove_hydrogens(mut self, remove: bool) -> Self {
        self.remove_hydrogens = remove;
        self
    }

    /// Number of supplied conformers.
    #[must_use]
    pub fn lookup_len(&self) -> usize {
        self.lookup.len()
    }

    fn conformer_for(&self, smiles: &str) -> Result<Conformer, DerivationError> {
        if let Some(conformer) = self.lookup.get(smiles) {
            return Ok(conformer.clone());
        }
        if !self.generate_missing {
            return Err(DerivationError::Geometry(
                "no source conformation and generation is disabled".to_string(),
            ));
        }
        let mol = Molecule::parse(smiles)?;
        Ok(generate(&mol))
    }
}

impl FeatureExtractor for ConformationExtractor {
    fn backbone_id(&self) -> &str {
        "unimol"
    }

    fn extract(&self, record: &Record) -> Result<Feature, DerivationError> {
        let mut conformer = self.conformer_for(&record.smiles)?;
        if self.remove_hydrogens {
            conformer = conformer.without_hydrogens();
        }
        if conformer.is_empty() {
            return Err(DerivationError::Geometry("conformation has no atoms".to_string()));
        }
        if conformer.len() > self.max_atoms {
            return Err(DerivationError::Unsupported(format!(
                "{} atoms exceeds limit of {}",
                conformer.len(),
                self.max_atoms
            )));
        }
        Ok(Feature::Conformation(conformer))
    }

    fn config_fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        (self.generate_missing, self.max_atoms, self.remove_hydrogens).hash(&mut hasher);
        self.lookup.len().hash(&mut hasher);
        // HashMap iteration order is per-process; hash in key order.
        let mut smiles: Vec<&String> = self.lookup.keys().collect();
        smiles.sort_unstable();
        for key in smiles {
            key.hash(&mut hasher);
            if let Some(conformer) = self.lookup.get(key) {
                conformer.atoms.hash(&mut hasher);
                for xyz in &conformer.coordinates {
                    xyz.map(f32::to_bits).hash(&mut hasher);
                }
            }
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance(a: [f32; 3], b: [f32; 3]) -> f32 {
        ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
    }

    fn conformation(extractor: &ConformationExtractor, smiles: &str) -> Conformer {
        match extractor.extract(&Record::new(smiles, vec![0.0])).unwrap() {
            Feature::Conformation(c) => c,
            other => panic!("unexpected feature {other:?}"),
        }
    }

    #[test]
    fn test_generated_bond_lengths() {
        let c = conformation(&ConformationExtractor::default(), "CC=O");
        assert_eq!(c.atoms(), ["C", "C", "O"]);
        let xyz = c.coordinates();
        assert!((distance(xyz[0], xyz[1]) - 1.54).abs() < 1e-4);
        assert!((distance(xyz[1], xyz[2]) - 1.34).abs() < 1e-4);
    }

    #[test]
    fn test_generated_atoms_do_not_overlap() {
        let c = conformation(&ConformationExtractor::default(), "CC(C)(C)C(C)(C)C");
        let xyz = c.coordinates();
        for i in 0..xyz.len() {
            for j in (i + 1)..xyz.len() {
                assert!(distance(xyz[i], xyz[j]) > 0.5, "atoms {i} and {j} overlap");
            }
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let extractor = ConformationExtractor::default();
        assert_eq!(
            conformation(&extractor, "c1ccccc1O"),
            conformation(&extractor, "c1ccccc1O")
        );
    }

    #[test]
    fn test_fragments_are_separated() {
        let c = conformation(&ConformationExtractor::default(), "[Na+].[Cl-]");
        assert!((distance(c.coordinates()[0], c.coordinates()[1]) - FRAGMENT_SPACING).abs() < 1e-4);
    }

    #[test]
    fn test_supplied_conformer_is_reused_without_hydrogens() {
        let supplied = Conformer::new(
            vec!["O".into(), "H".into(), "H".into()],
            vec![[0.0, 0.0, 0.0], [0.96, 0.0, 0.0], [-0.24, 0.93, 0.0]],
        );
        let lookup = HashMap::from([("O".to_string(), supplied)]);
        let extractor = ConformationExtractor::with_lookup(lookup);
        let c = conformation(&extractor, "O");
        assert_eq!(c.atoms(), ["O"]);
        assert_eq!(c.coordinates(), [[0.0, 0.0, 0.0]]);

        let kept = conformation(&extractor.clone().remove_hydrogens(false), "O");
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_generation_disabled() {
        let extractor = ConformationExtractor::default().generate_missing(false);
        let err = extractor.extract(&Record::new("CCO", vec![0.0])).unwrap_err();
        assert!(matches!(err, DerivationError::Geometry(_)));
    }

    #[test]
    fn test_config_fingerprint_tracks_settings() {
        let base = ConformationExtractor::default();
        let water = Conformer::new(vec!["O".into()], vec![[0.0, 0.0, 0.0]]);
        let moved = Conformer::new(vec!["O".into()], vec![[0.0, 0.0, 1.0]]);

        assert_eq!(base.config_fingerprint(), ConformationExtractor::default().config_fingerprint());
        assert_ne!(base.config_fingerprint(), base.clone().max_atoms(64).config_fingerprint());
        assert_ne!(base.config_fingerprint(), base.clone().remove_hydrogens(false).config_fingerprint());

        let supplied = ConformationExtractor::with_lookup(HashMap::from([("O".to_string(), water)]));
        let relocated = ConformationExtractor::with_lookup(HashMap::from([("O".to_string(), moved)]));
        assert_ne!(base.config_fingerprint(), supplied.config_fingerprint());
        assert_ne!(supplied.config_fingerprint(), relocated.config_fingerprint());
    }

    #[test]
    fn test_atom_limit() {
        let extractor = ConformationExtractor::default().max_atoms(3);
        let err = extractor.extract(&Record::new("CCCC", vec![0.0])).unwrap_err();
        assert!(matches!(err, DerivationError::Unsupported(_)));
    }
}
