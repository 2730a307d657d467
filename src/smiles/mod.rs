//! Minimal SMILES reader
//!
//! Parses SMILES strings into a [`Molecule`] graph that feature extractors
//! consume. This is a structural reader: it resolves atoms, bonds, branches
//! and ring closures, assigns implicit hydrogens from default valences, and
//! marks ring bonds. It performs no kekulization or stereo perception.
//!
//! # Example
//!
//! ```rust
//! use molprop_data::smiles::Molecule;
//!
//! let benzene = Molecule::parse("c1ccccc1")?;
//! assert_eq!(benzene.atom_count(), 6);
//! assert_eq!(benzene.ring_count(), 1);
//! assert_eq!(benzene.total_hydrogens(0), 1);
//! # Ok::<(), molprop_data::smiles::SmilesError>(())
//! ```

pub mod element;
mod token;

pub use element::Element;
pub use token::{tokenize, AtomSpec, BondOrder, Chirality, Lexeme, Token};

use std::collections::HashMap;
use thiserror::Error;

/// SMILES parse failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmilesError {
    /// Input contains no atoms
    #[error("empty SMILES")]
    Empty,

    /// Character outside the SMILES alphabet
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar {
        /// Offending character
        ch: char,
        /// Byte offset
        offset: usize,
    },

    /// Element symbol not in the periodic table subset
    #[error("unknown element '{symbol}' at offset {offset}")]
    UnknownElement {
        /// Symbol as written
        symbol: String,
        /// Byte offset
        offset: usize,
    },

    /// `[` without matching `]`
    #[error("unclosed bracket atom at offset {offset}")]
    UnclosedBracket {
        /// Byte offset of `[`
        offset: usize,
    },

    /// Bracket atom body does not follow the grammar
    #[error("malformed bracket atom '[{text}]' at offset {offset}")]
    MalformedBracket {
        /// Text between the brackets
        text: String,
        /// Byte offset of `[`
        offset: usize,
    },

    /// Bond, branch or ring symbol without a preceding atom, or dangling bond
    #[error("misplaced '{text}' at offset {offset}")]
    Misplaced {
        /// Token text
        text: String,
        /// Byte offset
        offset: usize,
    },

    /// `(` and `)` do not balance
    #[error("unbalanced parentheses")]
    UnbalancedParens,

    /// Ring closure digit never closed
    #[error("unclosed ring {0}")]
    UnclosedRing(u16),

    /// Ring closure would bond an atom to itself or duplicate an existing bond
    #[error("invalid ring closure {label} at offset {offset}")]
    InvalidRingClosure {
        /// Ring label
        label: u16,
        /// Byte offset
        offset: usize,
    },
}

/// An atom of a parsed molecule
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Atom as written
    pub spec: AtomSpec,
    /// Hydrogens implied by default valence (always 0 for bracket atoms)
    pub implicit_hydrogens: u8,
}

impl Atom {
    /// Element of the atom
    #[must_use]
    pub const fn element(&self) -> &'static Element {
        self.spec.element
    }
}

/// A bond between two atoms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bond {
    /// First atom index
    pub a: usize,
    /// Second atom index
    pub b: usize,
    /// Bond order
    pub order: BondOrder,
}

/// Molecular graph parsed from SMILES
#[derive(Debug, Clone)]
pub struct Molecule {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    /// Per atom: `(neighbor, bond index)`
    adjacency: Vec<Vec<(usize, usize)>>,
    ring_bond: Vec<bool>,
    components: usize,
}

impl Molecule {
    /// Parse a SMILES string
    ///
    /// # Errors
    ///
    /// Returns [`SmilesError`] for any lexical or structural error.
    pub fn parse(smiles: &str) -> Result<Self, SmilesError> {
        let lexemes = tokenize(smiles)?;

        let mut specs: Vec<AtomSpec> = Vec::new();
        let mut bonds: Vec<Bond> = Vec::new();
        let mut prev: Option<usize> = None;
        let mut pending: Option<(BondOrder, usize)> = None;
        let mut branches: Vec<usize> = Vec::new();
        let mut rings: HashMap<u16, (usize, Option<BondOrder>)> = HashMap::new();

        let misplaced = |lexeme: &Lexeme<'_>| SmilesError::Misplaced {
            text: lexeme.text.to_string(),
            offset: lexeme.offset,
        };

        for lexeme in &lexemes {
            match &lexeme.token {
                Token::Atom(spec) => {
                    let idx = specs.len();
                    if let Some(p) = prev {
                        let order = pending
                            .take()
                            .map_or_else(|| default_order(&specs[p], spec), |(o, _)| o);
                        bonds.push(Bond { a: p, b: idx, order });
                    }
                    specs.push(spec.clone());
                    prev = Some(idx);
                }
                Token::Bond(order) => {
                    if prev.is_none() || pending.is_some() {
                        return Err(misplaced(lexeme));
                    }
                    pending = Some((*order, lexeme.offset));
                }
                Token::BranchOpen => {
                    let p = prev.ok_or_else(|| misplaced(lexeme))?;
                    if pending.is_some() {
                        return Err(misplaced(lexeme));
                    }
                    branches.push(p);
                }
                Token::BranchClose => {
                    if pending.is_some() {
                        return Err(misplaced(lexeme));
                    }
                    prev = Some(branches.pop().ok_or(SmilesError::UnbalancedParens)?);
                }
                Token::Ring(label) => {
                    let p = prev.ok_or_else(|| misplaced(lexeme))?;
                    let written = pending.take().map(|(o, _)| o);
                    if let Some((open, open_order)) = rings.remove(label) {
                        let duplicate = bonds
                            .iter()
                            .any(|b| (b.a == open && b.b == p) || (b.a == p && b.b == open));
                        if open == p || duplicate {
                            return Err(SmilesError::InvalidRingClosure {
                                label: *label,
                                offset: lexeme.offset,
                            });
                        }
                        let order = written
                            .or(open_order)
                            .unwrap_or_else(|| default_order(&specs[open], &specs[p]));
                        bonds.push(Bond { a: open, b: p, order });
                    } else {
                        rings.insert(*label, (p, written));
                    }
                }
                Token::Dot => {
                    if prev.is_none() || pending.is_some() {
                        return Err(misplaced(lexeme));
                    }
                    prev = None;
                }
            }
        }

        if let Some((_, offset)) = pending {
            return Err(SmilesError::Misplaced {
                text: smiles[offset..].chars().take(1).collect(),
                offset,
            });
        }
        if !branches.is_empty() {
            return Err(SmilesError::UnbalancedParens);
        }
        if let Some(label) = rings.keys().min() {
            return Err(SmilesError::UnclosedRing(*label));
        }
        if specs.is_empty() {
            return Err(SmilesError::Empty);
        }

        Ok(Self::assemble(specs, bonds))
    }

    fn assemble(specs: Vec<AtomSpec>, bonds: Vec<Bond>) -> Self {
        let mut adjacency = vec![Vec::new(); specs.len()];
        for (i, bond) in bonds.iter().enumerate() {
            adjacency[bond.a].push((bond.b, i));
            adjacency[bond.b].push((bond.a, i));
        }

        let atoms = specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| {
                let used: u32 = adjacency[i]
                    .iter()
                    .map(|&(_, b)| u32::from(bonds[b].order.valence()))
                    .sum();
                let implicit_hydrogens = implicit_hydrogens(&spec, used);
                Atom {
                    spec,
                    implicit_hydrogens,
                }
            })
            .collect::<Vec<_>>();

        let (ring_bond, components) = find_ring_bonds(atoms.len(), &bonds, &adjacency);

        Self {
            atoms,
            bonds,
            adjacency,
            ring_bond,
            components,
        }
    }

    /// All atoms in input order
    #[must_use]
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// All bonds in input order
    #[must_use]
    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    /// Number of atoms written in the SMILES (hydrogens stay implicit)
    #[must_use]
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Neighbors of `atom` as `(neighbor index, bond)`
    pub fn neighbors(&self, atom: usize) -> impl Iterator<Item = (usize, &Bond)> + '_ {
        self.adjacency[atom]
            .iter()
            .map(move |&(n, b)| (n, &self.bonds[b]))
    }

    /// Number of explicit neighbors of `atom`
    #[must_use]
    pub fn degree(&self, atom: usize) -> usize {
        self.adjacency[atom].len()
    }

    /// Explicit bracket hydrogens plus implicit hydrogens
    #[must_use]
    pub fn total_hydrogens(&self, atom: usize) -> u8 {
        let a = &self.atoms[atom];
        a.spec.hydrogens.unwrap_or(0) + a.implicit_hydrogens
    }

    /// Whether bond `bond` lies on a ring
    #[must_use]
    pub fn is_ring_bond(&self, bond: usize) -> bool {
        self.ring_bond[bond]
    }

    /// Whether `atom` participates in any ring bond
    #[must_use]
    pub fn is_ring_atom(&self, atom: usize) -> bool {
        self.adjacency[atom].iter().any(|&(_, b)| self.ring_bond[b])
    }

    /// Number of disconnected fragments
    #[must_use]
    pub const fn fragment_count(&self) -> usize {
        self.components
    }

    /// Number of independent rings (cyclomatic number)
    #[must_use]
    pub fn ring_count(&self) -> usize {
        (self.bonds.len() + self.components).saturating_sub(self.atoms.len())
    }
}

fn default_order(a: &AtomSpec, b: &AtomSpec) -> BondOrder {
    if a.aromatic && b.aromatic {
        BondOrder::Aromatic
    } else {
        BondOrder::Single
    }
}

fn implicit_hydrogens(spec: &AtomSpec, bond_valence: u32) -> u8 {
    if spec.bracket {
        return 0;
    }
    // Aromatic atoms contribute one extra electron to the pi system.
    let used = bond_valence + u32::from(spec.aromatic);
    spec.element
        .valences
        .iter()
        .map(|&v| u32::from(v))
        .find(|&v| v >= used)
        .and_then(|v| u8::try_from(v - used).ok())
        .unwrap_or(0)
}

/// Mark bridges with Tarjan's low-link; every non-bridge bond is a ring bond.
fn find_ring_bonds(
    n_atoms: usize,
    bonds: &[Bond],
    adjacency: &[Vec<(usize, usize)>],
) -> (Vec<bool>, usize) {
    let mut ring = vec![true; bonds.len()];
    let mut disc = vec![usize::MAX; n_atoms];
    let mut low = vec![0usize; n_atoms];
    let mut timer = 0usize;
    let mut components = 0usize;

    for root in 0..n_atoms {
        if disc[root] != usize::MAX {
            continue;
        }
        components += 1;
        // Explicit stack of (atom, parent bond, next neighbor cursor)
        let mut stack: Vec<(usize, Option<usize>, usize)> = vec![(root, None, 0)];
        disc[root] = timer;
        low[root] = timer;
        timer += 1;

        while let Some(&mut (atom, parent_bond, ref mut cursor)) = stack.last_mut() {
            if let Some(&(next, bond)) = adjacency[atom].get(*cursor) {
                *cursor += 1;
                if Some(bond) == parent_bond {
                    continue;
                }
                if disc[next] == usize::MAX {
                    disc[next] = timer;
                    low[next] = timer;
                    timer += 1;
                    stack.push((next, Some(bond), 0));
                } else {
                    low[atom] = low[atom].min(disc[next]);
                }
            } else {
                stack.pop();
                if let (Some(bond), Some(&(parent, _, _))) = (parent_bond, stack.last()) {
                    low[parent] = low[parent].min(low[atom]);
                    if low[atom] > disc[parent] {
                        ring[bond] = false;
                    }
                }
            }
        }
    }

    (ring, components)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ethanol() {
        let mol = Molecule::parse("CCO").unwrap();
        assert_eq!(mol.atom_count(), 3);
        assert_eq!(mol.bonds().len(), 2);
        assert_eq!(mol.total_hydrogens(0), 3);
        assert_eq!(mol.total_hydrogens(1), 2);
        assert_eq!(mol.total_hydrogens(2), 1);
        assert_eq!(mol.ring_count(), 0);
    }

    #[test]
    fn test_parse_acetic_acid_branch() {
        let mol = Molecule::parse("CC(=O)O").unwrap();
        assert_eq!(mol.degree(1), 3);
        assert_eq!(mol.bonds()[1].order, BondOrder::Double);
        assert_eq!(mol.total_hydrogens(2), 0);
        assert_eq!(mol.total_hydrogens(3), 1);
    }

    #[test]
    fn test_benzene_is_aromatic_ring() {
        let mol = Molecule::parse("c1ccccc1").unwrap();
        assert_eq!(mol.bonds().len(), 6);
        assert!(mol.bonds().iter().all(|b| b.order == BondOrder::Aromatic));
        assert!((0..6).all(|b| mol.is_ring_bond(b)));
        assert_eq!(mol.ring_count(), 1);
    }

    #[test]
    fn test_pyridine_nitrogen_has_no_hydrogen() {
        let mol = Molecule::parse("c1ccncc1").unwrap();
        assert_eq!(mol.total_hydrogens(3), 0);
    }

    #[test]
    fn test_ring_and_chain_bonds() {
        // Toluene: the methyl bond is a bridge
        let mol = Molecule::parse("Cc1ccccc1").unwrap();
        assert!(!mol.is_ring_bond(0));
        assert!(mol.is_ring_atom(1));
        assert!(!mol.is_ring_atom(0));
    }

    #[test]
    fn test_fused_rings() {
        let naphthalene = Molecule::parse("c1ccc2ccccc2c1").unwrap();
        assert_eq!(naphthalene.ring_count(), 2);
        assert_eq!(naphthalene.total_hydrogens(3), 0);
    }

    #[test]
    fn test_disconnected_fragments() {
        let salt = Molecule::parse("[Na+].[Cl-]").unwrap();
        assert_eq!(salt.fragment_count(), 2);
        assert!(salt.bonds().is_empty());
        assert_eq!(salt.atoms()[0].spec.charge, 1);
    }

    #[test]
    fn test_ring_closure_bond_order() {
        let mol = Molecule::parse("C=1CCCCC1").unwrap();
        let closure = mol.bonds().last().unwrap();
        assert_eq!(closure.order, BondOrder::Double);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Molecule::parse("").unwrap_err(), SmilesError::Empty);
        assert_eq!(
            Molecule::parse("C(C").unwrap_err(),
            SmilesError::UnbalancedParens
        );
        assert_eq!(Molecule::parse("CC)").unwrap_err(), SmilesError::UnbalancedParens);
        assert_eq!(Molecule::parse("C1CC").unwrap_err(), SmilesError::UnclosedRing(1));
        assert!(matches!(
            Molecule::parse("=CC").unwrap_err(),
            SmilesError::Misplaced { .. }
        ));
        assert!(matches!(
            Molecule::parse("CC=").unwrap_err(),
            SmilesError::Misplaced { .. }
        ));
        assert!(matches!(
            Molecule::parse("C11").unwrap_err(),
            SmilesError::InvalidRingClosure { label: 1, .. }
        ));
    }

    #[test]
    fn test_hypervalent_center_parses_without_overflow() {
        let smiles = format!("C{}", "(C)".repeat(300));
        let mol = Molecule::parse(&smiles).unwrap();
        assert_eq!(mol.atom_count(), 301);
        assert_eq!(mol.degree(0), 300);
        assert_eq!(mol.total_hydrogens(0), 0);
        assert_eq!(mol.total_hydrogens(1), 3);
    }
}
