//! Molecular graph representation

use std::fmt;

/// Bond multiplicity as written in SMILES
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Quadruple,
    Aromatic,
}

impl BondOrder {
    /// Contribution of the bond to an atom's valence sum.
    ///
    /// Aromatic bonds count as one; the aromatic atom itself adds the extra
    /// electron (see [`Molecule::implicit_hydrogens`]).
    pub fn valence(self) -> u8 {
        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Quadruple => 4,
        }
    }

    /// Stable code used in canonical invariants
    pub fn code(self) -> u8 {
        match self {
            BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Quadruple => 4,
            BondOrder::Aromatic => 5,
        }
    }
}

/// A single atom of a molecular graph
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Element symbol with standard capitalization (`C`, `Cl`, `*`)
    pub symbol: String,
    /// Atomic number (0 for the wildcard atom)
    pub atomic_number: u8,
    /// Written in lowercase aromatic form
    pub aromatic: bool,
    /// Formal charge
    pub charge: i8,
    /// Mass number when one was given
    pub isotope: Option<u16>,
    /// Hydrogen count; `None` for organic-subset atoms whose hydrogens are implicit
    pub explicit_hydrogens: Option<u8>,
}

impl Atom {
    /// Organic-subset atom with implicit hydrogens
    pub fn organic(symbol: &str, atomic_number: u8, aromatic: bool) -> Self {
        Self {
            symbol: symbol.to_string(),
            atomic_number,
            aromatic,
            charge: 0,
            isotope: None,
            explicit_hydrogens: None,
        }
    }
}

/// Bond between two atom indices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bond {
    pub a: usize,
    pub b: usize,
    pub order: BondOrder,
}

impl Bond {
    /// The atom on the other side of `atom`
    pub fn other(&self, atom: usize) -> usize {
        if self.a == atom {
            self.b
        } else {
            self.a
        }
    }
}

/// Molecular graph with adjacency lists.
///
/// Molecules produced by the canonicalizer carry their canonical SMILES and
/// their atoms are numbered in canonical output order.
#[derive(Debug, Clone, PartialEq)]
pub struct Molecule {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    /// atom -> list of bond indices
    adjacency: Vec<Vec<usize>>,
    source: String,
    canonical: Option<String>,
}

impl Molecule {
    pub(crate) fn new(source: &str) -> Self {
        Self {
            atoms: Vec::new(),
            bonds: Vec::new(),
            adjacency: Vec::new(),
            source: source.to_string(),
            canonical: None,
        }
    }

    pub(crate) fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        self.atoms.len() - 1
    }

    /// Add a bond; returns false when the pair is already bonded
    pub(crate) fn add_bond(&mut self, a: usize, b: usize, order: BondOrder) -> bool {
        if a == b || self.bond_between(a, b).is_some() {
            return false;
        }
        let index = self.bonds.len();
        self.bonds.push(Bond { a, b, order });
        self.adjacency[a].push(index);
        self.adjacency[b].push(index);
        true
    }

    pub(crate) fn set_canonical(&mut self, smiles: String) {
        self.canonical = Some(smiles);
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Text the molecule was parsed from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Canonical SMILES, present once the molecule went through a canonicalizer
    pub fn canonical_smiles(&self) -> Option<&str> {
        self.canonical.as_deref()
    }

    /// Bonds incident to `atom`
    pub fn bonds_of(&self, atom: usize) -> impl Iterator<Item = &Bond> + '_ {
        self.adjacency[atom].iter().map(move |&i| &self.bonds[i])
    }

    /// `(neighbor, order)` pairs of `atom`
    pub fn neighbors(&self, atom: usize) -> impl Iterator<Item = (usize, BondOrder)> + '_ {
        self.bonds_of(atom).map(move |b| (b.other(atom), b.order))
    }

    pub fn degree(&self, atom: usize) -> usize {
        self.adjacency[atom].len()
    }

    pub fn bond_between(&self, a: usize, b: usize) -> Option<&Bond> {
        self.bond_index(a, b).map(|i| &self.bonds[i])
    }

    /// Index into [`Molecule::bonds`] of the bond joining `a` and `b`
    pub fn bond_index(&self, a: usize, b: usize) -> Option<usize> {
        self.adjacency[a]
            .iter()
            .copied()
            .find(|&i| self.bonds[i].other(a) == b)
    }

    /// Hydrogen count, explicit for bracket atoms, derived from default
    /// valences for organic-subset atoms.
    pub fn implicit_hydrogens(&self, atom: usize) -> u8 {
        let a = &self.atoms[atom];
        if let Some(h) = a.explicit_hydrogens {
            return h;
        }
        default_hydrogens(a, self.valence_sum(atom))
    }

    /// Sum of bond valences, plus one for aromatic atoms
    pub fn valence_sum(&self, atom: usize) -> usize {
        let bonds: usize = self
            .bonds_of(atom)
            .map(|b| usize::from(b.order.valence()))
            .sum();
        bonds + usize::from(self.atoms[atom].aromatic)
    }

    /// Whether `atom` lies on a cycle
    pub fn in_ring(&self, atom: usize) -> bool {
        self.adjacency[atom]
            .iter()
            .any(|&bond| self.bond_in_ring(bond))
    }

    /// A bond is in a ring when its endpoints stay connected without it
    pub fn bond_in_ring(&self, bond: usize) -> bool {
        let Bond { a, b, .. } = self.bonds[bond];
        let mut seen = vec![false; self.atoms.len()];
        let mut stack = vec![a];
        seen[a] = true;
        while let Some(current) = stack.pop() {
            for &edge in &self.adjacency[current] {
                if edge == bond {
                    continue;
                }
                let next = self.bonds[edge].other(current);
                if next == b {
                    return true;
                }
                if !seen[next] {
                    seen[next] = true;
                    stack.push(next);
                }
            }
        }
        false
    }

    /// Connected components as sorted atom index lists
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut seen = vec![false; self.atoms.len()];
        let mut components = Vec::new();
        for start in 0..self.atoms.len() {
            if seen[start] {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![start];
            seen[start] = true;
            while let Some(current) = stack.pop() {
                component.push(current);
                for (next, _) in self.neighbors(current) {
                    if !seen[next] {
                        seen[next] = true;
                        stack.push(next);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }
}

impl fmt::Display for Molecule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical.as_deref().unwrap_or(&self.source))
    }
}

/// Default valences of the organic subset
pub fn default_valences(atomic_number: u8) -> &'static [u8] {
    match atomic_number {
        5 => &[3],
        6 => &[4],
        7 | 15 => &[3, 5],
        8 => &[2],
        16 => &[2, 4, 6],
        9 | 17 | 35 | 53 => &[1],
        _ => &[],
    }
}

/// Whether the atom can be written without brackets
pub fn is_organic_subset(atomic_number: u8) -> bool {
    matches!(atomic_number, 0 | 5 | 6 | 7 | 8 | 9 | 15 | 16 | 17 | 35 | 53)
}

/// Hydrogens an organic-subset atom receives from its default valences
pub(crate) fn default_hydrogens(atom: &Atom, valence_sum: usize) -> u8 {
    default_valences(atom.atomic_number)
        .iter()
        .find(|&&v| usize::from(v) >= valence_sum)
        .and_then(|&v| u8::try_from(usize::from(v) - valence_sum).ok())
        .unwrap_or(0)
}

const ELEMENTS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb",
    "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl",
    "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk",
    "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn", "Nh",
    "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Atomic number of an element symbol (`*` is 0)
pub fn atomic_number(symbol: &str) -> Option<u8> {
    if symbol == "*" {
        return Some(0);
    }
    ELEMENTS
        .iter()
        .position(|&e| e == symbol)
        .map(|i| i as u8 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_numbers() {
        assert_eq!(atomic_number("C"), Some(6));
        assert_eq!(atomic_number("Cl"), Some(17));
        assert_eq!(atomic_number("Og"), Some(118));
        assert_eq!(atomic_number("*"), Some(0));
        assert_eq!(atomic_number("Xx"), None);
    }

    #[test]
    fn test_implicit_hydrogens_and_rings() {
        // propan-2-ol without the parser: C-C(-O)-C
        let mut mol = Molecule::new("CC(O)C");
        let c1 = mol.add_atom(Atom::organic("C", 6, false));
        let c2 = mol.add_atom(Atom::organic("C", 6, false));
        let o = mol.add_atom(Atom::organic("O", 8, false));
        let c3 = mol.add_atom(Atom::organic("C", 6, false));
        assert!(mol.add_bond(c1, c2, BondOrder::Single));
        assert!(mol.add_bond(c2, o, BondOrder::Single));
        assert!(mol.add_bond(c2, c3, BondOrder::Single));
        assert!(!mol.add_bond(c2, c1, BondOrder::Double));

        assert_eq!(mol.implicit_hydrogens(c1), 3);
        assert_eq!(mol.implicit_hydrogens(c2), 1);
        assert_eq!(mol.implicit_hydrogens(o), 1);
        assert!(!mol.in_ring(c2));
        assert_eq!(mol.components().len(), 1);
        assert_eq!(mol.to_string(), "CC(O)C");
    }
}
