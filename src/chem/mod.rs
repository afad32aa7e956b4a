//! Chemistry toolkit: SMILES reading, canonicalization, depiction

pub mod canon;
pub mod depict;
pub mod molecule;
pub mod smiles;
pub mod solvents;

pub use canon::{CanonicalizeError, Canonicalizer, GraphCanonicalizer};
pub use molecule::{Atom, Bond, BondOrder, Molecule};
pub use smiles::SmilesError;
