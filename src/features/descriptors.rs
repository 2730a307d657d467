//! Whole-molecule descriptors for the `DNN-rdkit` backbone

use super::{DerivationError, Feature, FeatureExtractor};
use crate::dataset::Record;
use crate::smiles::{BondOrder, Molecule};

/// Descriptor names, in vector order
pub const DESCRIPTOR_NAMES: [&str; 21] = [
    "heavy_atoms",
    "hydrogens",
    "molecular_weight",
    "carbon",
    "nitrogen",
    "oxygen",
    "sulfur",
    "phosphorus",
    "fluorine",
    "chlorine",
    "bromine",
    "iodine",
    "heteroatoms",
    "aromatic_atoms",
    "rings",
    "rotatable_bonds",
    "double_bonds",
    "triple_bonds",
    "aromatic_bonds",
    "formal_charge",
    "fragments",
];

const HYDROGEN_MASS: f32 = 1.008;

/// Computes [`DESCRIPTOR_NAMES`] for each molecule.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorExtractor;

impl DescriptorExtractor {
    /// Create a descriptor extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Compute the descriptor vector of a parsed molecule.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn describe(mol: &Molecule) -> Vec<f32> {
        let mut values = vec![0.0f32; DESCRIPTOR_NAMES.len()];
        let mut hydrogens = 0u32;
        let mut weight = 0.0f32;
        let mut charge = 0i32;

        for (i, atom) in mol.atoms().iter().enumerate() {
            let element = atom.element();
            hydrogens += u32::from(mol.total_hydrogens(i));
            weight += element.mass;
            charge += i32::from(atom.spec.charge);

            if element.number == 1 {
                hydrogens += 1;
                continue;
            }
            if element.number > 1 {
                values[0] += 1.0;
            }
            let slot = match element.symbol {
                "C" => Some(3),
                "N" => Some(4),
                "O" => Some(5),
                "S" => Some(6),
                "P" => Some(7),
                "F" => Some(8),
                "Cl" => Some(9),
                "Br" => Some(10),
                "I" => Some(11),
                _ => None,
            };
            if let Some(slot) = slot {
                values[slot] += 1.0;
            }
            if element.number > 1 && element.number != 6 {
                values[12] += 1.0;
            }
            if atom.spec.aromatic {
                values[13] += 1.0;
            }
        }

        for (b, bond) in mol.bonds().iter().enumerate() {
            match bond.order {
                BondOrder::Double => values[16] += 1.0,
                BondOrder::Triple => values[17] += 1.0,
                BondOrder::Aromatic => values[18] += 1.0,
                BondOrder::Single | BondOrder::Quadruple => {}
            }
            let rotatable = bond.order == BondOrder::Single
                && !mol.is_ring_bond(b)
                && mol.degree(bond.a) > 1
                && mol.degree(bond.b) > 1;
            if rotatable {
                values[15] += 1.0;
            }
        }

        values[1] = hydrogens as f32;
        // Explicit [H] atoms were already counted in `weight`.
        let implicit: u32 = (0..mol.atom_count())
            .map(|i| u32::from(mol.total_hydrogens(i)))
            .sum();
        values[2] = (implicit as f32).mul_add(HYDROGEN_MASS, weight);
        values[14] = mol.ring_count() as f32;
        values[19] = charge as f32;
        values[20] = mol.fragment_count() as f32;
        values
    }
}

impl FeatureExtractor for DescriptorExtractor {
    fn backbone_id(&self) -> &str {
        "dnn-rdkit"
    }

    fn extract(&self, record: &Record) -> Result<Feature, DerivationError> {
        let mol = Molecule::parse(&record.smiles)?;
        Ok(Feature::Dense {
            values: Self::describe(&mol),
        })
    }
}
