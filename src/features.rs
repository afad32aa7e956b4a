//! Atom-centered fragment features for native pipelines.
//!
//! Every atom contributes one fragment per radius `0..=radius`. A fragment
//! key describes the atom and, for higher radii, the sorted keys of its
//! neighbors one radius lower. Keys only depend on the molecular graph, so
//! equivalent structures produce the same multiset of fragments.

use crate::chem::Molecule;
use std::collections::BTreeMap;

/// Extracts atom-centered fragments from molecules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentFeaturizer {
    radius: usize,
}

impl FragmentFeaturizer {
    /// Create a featurizer; radius 0 only describes the atoms themselves
    pub fn new(radius: usize) -> Self {
        Self { radius }
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Fragment keys centered on each atom, indexed by atom
    pub fn atom_fragments(&self, mol: &Molecule) -> Vec<Vec<String>> {
        let n = mol.atom_count();
        let mut current: Vec<String> = (0..n).map(|a| atom_key(mol, a)).collect();
        let mut fragments: Vec<Vec<String>> = current.iter().map(|k| vec![k.clone()]).collect();

        for _ in 0..self.radius {
            let next: Vec<String> = (0..n)
                .map(|a| {
                    let mut around: Vec<String> = mol
                        .neighbors(a)
                        .map(|(nbr, order)| format!("{}{}", bond_char(order.code()), current[nbr]))
                        .collect();
                    around.sort();
                    format!("{}({})", atom_key(mol, a), around.join(","))
                })
                .collect();
            for (atom, key) in next.iter().enumerate() {
                fragments[atom].push(key.clone());
            }
            current = next;
        }
        fragments
    }

    /// Fragment counts over the whole molecule
    pub fn fragment_counts(&self, mol: &Molecule) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for key in self.atom_fragments(mol).into_iter().flatten() {
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }
}

impl Default for FragmentFeaturizer {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Radius-0 key: element, aromaticity, hydrogens, charge
fn atom_key(mol: &Molecule, atom: usize) -> String {
    let a = &mol.atoms()[atom];
    let symbol = if a.aromatic {
        a.symbol.to_ascii_lowercase()
    } else {
        a.symbol.clone()
    };
    let mut key = format!("{symbol};H{}", mol.implicit_hydrogens(atom));
    if a.charge != 0 {
        key.push_str(&format!(";{:+}", a.charge));
    }
    key
}

fn bond_char(code: u8) -> char {
    match code {
        2 => '=',
        3 => '#',
        4 => '$',
        5 => ':',
        _ => '-',
    }
}
