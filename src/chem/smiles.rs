//! SMILES reader

use super::molecule::{atomic_number, Atom, BondOrder, Molecule};
use std::collections::HashMap;
use thiserror::Error;

/// Reasons a string is not a valid SMILES
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SmilesError {
    #[error("empty SMILES")]
    Empty,

    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },

    #[error("unknown element '{symbol}' at position {position}")]
    UnknownElement { symbol: String, position: usize },

    #[error("bond or branch at position {position} has no preceding atom")]
    MissingAtom { position: usize },

    #[error("unbalanced parentheses")]
    UnbalancedBranch,

    #[error("bond symbol at position {position} is not followed by an atom")]
    DanglingBond { position: usize },

    #[error("ring closure {label} is never closed")]
    UnclosedRing { label: u16 },

    #[error("ring closure {label} has conflicting bond orders")]
    RingBondConflict { label: u16 },

    #[error("atoms {a} and {b} are bonded twice")]
    DuplicateBond { a: usize, b: usize },

    #[error("unterminated bracket atom starting at position {position}")]
    UnterminatedBracket { position: usize },

    #[error("aromatic atom {atom} is not part of a ring")]
    NonRingAromatic { atom: usize },

    #[error("{what} at position {position} is out of range")]
    OutOfRange { what: &'static str, position: usize },

    #[error("more than {limit} atoms")]
    TooManyAtoms { limit: usize },
}

/// Largest molecule the reader accepts
pub const MAX_ATOMS: usize = 500;

/// Parse a SMILES string into a molecular graph
pub fn parse(input: &str) -> Result<Molecule, SmilesError> {
    if input.is_empty() {
        return Err(SmilesError::Empty);
    }
    Reader::new(input).read()
}

struct Reader<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    mol: Molecule,
    previous: Option<usize>,
    branches: Vec<Option<usize>>,
    pending: Option<(BondOrder, usize)>,
    rings: HashMap<u16, (usize, Option<BondOrder>)>,
}

impl<'a> Reader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            mol: Molecule::new(text),
            previous: None,
            branches: Vec::new(),
            pending: None,
            rings: HashMap::new(),
        }
    }

    fn read(mut self) -> Result<Molecule, SmilesError> {
        while self.pos < self.bytes.len() {
            let position = self.pos;
            let byte = self.bytes[position];
            match byte {
                b'(' => {
                    if self.previous.is_none() || self.pending.is_some() {
                        return Err(SmilesError::MissingAtom { position });
                    }
                    if self.bytes.get(position + 1) == Some(&b')') {
                        return Err(SmilesError::UnbalancedBranch);
                    }
                    self.branches.push(self.previous);
                    self.pos += 1;
                }
                b')' => {
                    if let Some((_, at)) = self.pending {
                        return Err(SmilesError::DanglingBond { position: at });
                    }
                    self.previous = self.branches.pop().ok_or(SmilesError::UnbalancedBranch)?;
                    self.pos += 1;
                }
                b'-' | b'=' | b'#' | b'$' | b':' | b'/' | b'\\' => {
                    if self.previous.is_none() || self.pending.is_some() {
                        return Err(SmilesError::MissingAtom { position });
                    }
                    let order = match byte {
                        b'=' => BondOrder::Double,
                        b'#' => BondOrder::Triple,
                        b'$' => BondOrder::Quadruple,
                        b':' => BondOrder::Aromatic,
                        _ => BondOrder::Single,
                    };
                    self.pending = Some((order, position));
                    self.pos += 1;
                }
                b'.' => {
                    if let Some((_, at)) = self.pending {
                        return Err(SmilesError::DanglingBond { position: at });
                    }
                    if self.previous.is_none() {
                        return Err(SmilesError::MissingAtom { position });
                    }
                    self.previous = None;
                    self.pos += 1;
                }
                b'0'..=b'9' | b'%' => self.ring_bond(position)?,
                b'[' => {
                    let atom = self.bracket_atom()?;
                    self.attach(atom)?;
                }
                _ => {
                    let atom = self.organic_atom()?;
                    self.attach(atom)?;
                }
            }
        }

        if let Some((_, position)) = self.pending {
            return Err(SmilesError::DanglingBond { position });
        }
        if !self.branches.is_empty() {
            return Err(SmilesError::UnbalancedBranch);
        }
        if let Some(&label) = self.rings.keys().min() {
            return Err(SmilesError::UnclosedRing { label });
        }
        if self.previous.is_none() {
            // trailing '.'
            return Err(SmilesError::MissingAtom { position: self.bytes.len() });
        }
        for atom in 0..self.mol.atom_count() {
            if self.mol.atoms()[atom].aromatic && !self.mol.in_ring(atom) {
                return Err(SmilesError::NonRingAromatic { atom });
            }
        }
        Ok(self.mol)
    }

    fn attach(&mut self, atom: Atom) -> Result<(), SmilesError> {
        if self.mol.atom_count() == MAX_ATOMS {
            return Err(SmilesError::TooManyAtoms { limit: MAX_ATOMS });
        }
        let index = self.mol.add_atom(atom);
        if let Some(previous) = self.previous {
            let order = match self.pending.take() {
                Some((order, _)) => order,
                None => self.default_order(previous, index),
            };
            if !self.mol.add_bond(previous, index, order) {
                return Err(SmilesError::DuplicateBond { a: previous, b: index });
            }
        }
        self.previous = Some(index);
        Ok(())
    }

    fn default_order(&self, a: usize, b: usize) -> BondOrder {
        let atoms = self.mol.atoms();
        if atoms[a].aromatic && atoms[b].aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn ring_bond(&mut self, position: usize) -> Result<(), SmilesError> {
        let current = self.previous.ok_or(SmilesError::MissingAtom { position })?;
        let label = if self.bytes[position] == b'%' {
            let digits = self
                .text
                .get(position + 1..position + 3)
                .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
                .ok_or(SmilesError::UnexpectedCharacter { ch: '%', position })?;
            self.pos += 3;
            digits.parse::<u16>().map_err(|_| SmilesError::UnexpectedCharacter { ch: '%', position })?
        } else {
            self.pos += 1;
            u16::from(self.bytes[position] - b'0')
        };
        let written = self.pending.take().map(|(order, _)| order);

        match self.rings.remove(&label) {
            None => {
                self.rings.insert(label, (current, written));
            }
            Some((opener, opened_with)) => {
                let order = match (opened_with, written) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(SmilesError::RingBondConflict { label })
                    }
                    (Some(order), _) | (None, Some(order)) => order,
                    (None, None) => self.default_order(opener, current),
                };
                if !self.mol.add_bond(opener, current, order) {
                    return Err(SmilesError::DuplicateBond { a: opener, b: current });
                }
            }
        }
        Ok(())
    }

    fn organic_atom(&mut self) -> Result<Atom, SmilesError> {
        let position = self.pos;
        let rest = &self.bytes[position..];
        let (symbol, aromatic, len) = match rest {
            [b'C', b'l', ..] => ("Cl", false, 2),
            [b'B', b'r', ..] => ("Br", false, 2),
            [b'B', ..] => ("B", false, 1),
            [b'C', ..] => ("C", false, 1),
            [b'N', ..] => ("N", false, 1),
            [b'O', ..] => ("O", false, 1),
            [b'P', ..] => ("P", false, 1),
            [b'S', ..] => ("S", false, 1),
            [b'F', ..] => ("F", false, 1),
            [b'I', ..] => ("I", false, 1),
            [b'*', ..] => ("*", false, 1),
            [b'b', ..] => ("B", true, 1),
            [b'c', ..] => ("C", true, 1),
            [b'n', ..] => ("N", true, 1),
            [b'o', ..] => ("O", true, 1),
            [b'p', ..] => ("P", true, 1),
            [b's', ..] => ("S", true, 1),
            _ => return Err(self.unexpected(position)),
        };
        self.pos += len;
        let number = atomic_number(symbol).ok_or_else(|| SmilesError::UnknownElement {
            symbol: symbol.to_string(),
            position,
        })?;
        Ok(Atom::organic(symbol, number, aromatic))
    }

    fn bracket_atom(&mut self) -> Result<Atom, SmilesError> {
        let start = self.pos;
        self.pos += 1;

        let isotope_at = self.pos;
        let isotope = self
            .number()?
            .map(|n| u16::try_from(n).map_err(|_| out_of_range("isotope", isotope_at)))
            .transpose()?;

        let symbol_at = self.pos;
        let (symbol, aromatic) = self.bracket_symbol()?;
        let atomic = atomic_number(&symbol).ok_or_else(|| SmilesError::UnknownElement {
            symbol: symbol.clone(),
            position: symbol_at,
        })?;

        // chirality is accepted and discarded
        if self.peek() == Some(b'@') {
            self.pos += 1;
            if self.peek() == Some(b'@') {
                self.pos += 1;
            } else if let Some(class) = self.text.get(self.pos..self.pos + 2) {
                if matches!(class, "TH" | "AL" | "SP" | "TB" | "OH") {
                    self.pos += 2;
                    self.number()?;
                }
            }
        }

        let mut hydrogens = 0u8;
        if self.peek() == Some(b'H') {
            let at = self.pos;
            self.pos += 1;
            hydrogens = match self.number()? {
                Some(n) => u8::try_from(n).map_err(|_| out_of_range("hydrogen count", at))?,
                None => 1,
            };
        }

        let mut charge: i8 = 0;
        if let Some(sign @ (b'+' | b'-')) = self.peek() {
            let at = self.pos;
            self.pos += 1;
            let magnitude = match self.number()? {
                Some(n) => n,
                None => {
                    let mut repeated = 1u32;
                    while self.peek() == Some(sign) {
                        self.pos += 1;
                        repeated = repeated.saturating_add(1);
                    }
                    repeated
                }
            };
            // i8 magnitude keeps the negation in range
            let magnitude = i8::try_from(magnitude).map_err(|_| out_of_range("charge", at))?;
            charge = if sign == b'+' { magnitude } else { -magnitude };
        }

        if self.peek() == Some(b':') {
            self.pos += 1;
            self.number()?;
        }

        if self.peek() != Some(b']') {
            if self.pos >= self.bytes.len() {
                return Err(SmilesError::UnterminatedBracket { position: start });
            }
            return Err(self.unexpected(self.pos));
        }
        self.pos += 1;

        Ok(Atom {
            symbol,
            atomic_number: atomic,
            aromatic,
            charge,
            isotope,
            explicit_hydrogens: Some(hydrogens),
        })
    }

    fn bracket_symbol(&mut self) -> Result<(String, bool), SmilesError> {
        let position = self.pos;
        let first = self.peek().ok_or(SmilesError::UnterminatedBracket { position })?;
        match first {
            b'*' => {
                self.pos += 1;
                Ok(("*".to_string(), false))
            }
            b'A'..=b'Z' => {
                if let Some(two) = self.text.get(position..position + 2) {
                    if two.as_bytes()[1].is_ascii_lowercase() && atomic_number(two).is_some() {
                        self.pos += 2;
                        return Ok((two.to_string(), false));
                    }
                }
                self.pos += 1;
                Ok(((first as char).to_string(), false))
            }
            b'a'..=b'z' => {
                for aromatic in ["se", "as", "te"] {
                    if self.text.get(position..position + 2) == Some(aromatic) {
                        self.pos += 2;
                        return Ok((capitalize(aromatic), true));
                    }
                }
                if matches!(first, b'b' | b'c' | b'n' | b'o' | b'p' | b's') {
                    self.pos += 1;
                    return Ok(((first as char).to_ascii_uppercase().to_string(), true));
                }
                Err(self.unexpected(position))
            }
            _ => Err(self.unexpected(position)),
        }
    }

    fn number(&mut self) -> Result<Option<u32>, SmilesError> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return Ok(None);
        }
        self.text[start..self.pos]
            .parse()
            .map(Some)
            .map_err(|_| out_of_range("number", start))
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn unexpected(&self, position: usize) -> SmilesError {
        let ch = self.text[position..].chars().next().unwrap_or('\0');
        SmilesError::UnexpectedCharacter { ch, position }
    }
}

fn out_of_range(what: &'static str, position: usize) -> SmilesError {
    SmilesError::OutOfRange { what, position }
}

fn capitalize(symbol: &str) -> String {
    let mut chars = symbol.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ethanol() {
        let mol = parse("CCO").unwrap();
        assert_eq!(mol.atom_count(), 3);
        assert_eq!(mol.bonds().len(), 2);
        assert_eq!(mol.implicit_hydrogens(0), 3);
        assert_eq!(mol.implicit_hydrogens(2), 1);
    }

    #[test]
    fn test_parse_benzene_ring() {
        let mol = parse("c1ccccc1").unwrap();
        assert_eq!(mol.atom_count(), 6);
        assert_eq!(mol.bonds().len(), 6);
        assert!(mol.bonds().iter().all(|b| b.order == BondOrder::Aromatic));
        assert!((0..6).all(|a| mol.implicit_hydrogens(a) == 1));
        assert!(mol.in_ring(3));
    }

    #[test]
    fn test_parse_branches_and_double_bonds() {
        let mol = parse("CC(=O)O").unwrap();
        assert_eq!(mol.atom_count(), 4);
        assert_eq!(mol.bond_between(1, 2).unwrap().order, BondOrder::Double);
        assert_eq!(mol.implicit_hydrogens(1), 0);
        assert_eq!(mol.implicit_hydrogens(3), 1);
    }

    #[test]
    fn test_parse_bracket_atoms() {
        let mol = parse("[NH4+].[Cl-]").unwrap();
        assert_eq!(mol.atoms()[0].charge, 1);
        assert_eq!(mol.implicit_hydrogens(0), 4);
        assert_eq!(mol.atoms()[1].symbol, "Cl");
        assert_eq!(mol.atoms()[1].charge, -1);
        assert_eq!(mol.components().len(), 2);

        let mol = parse("[13CH3][C@@H](N)C(=O)O").unwrap();
        assert_eq!(mol.atoms()[0].isotope, Some(13));
        assert_eq!(mol.implicit_hydrogens(1), 1);

        let mol = parse("c1cc[nH]c1").unwrap();
        assert_eq!(mol.atoms()[3].symbol, "N");
        assert!(mol.atoms()[3].aromatic);
    }

    #[test]
    fn test_parse_two_digit_ring_labels() {
        let mol = parse("C%12CCCCC%12").unwrap();
        assert_eq!(mol.bonds().len(), 6);
    }

    #[test]
    fn test_reject_non_smiles_tokens() {
        assert!(parse("").is_err());
        assert!(parse("35.2").is_err());
        assert!(parse("-3").is_err());
        assert!(parse("water").is_err());
        assert!(parse("C1CC").is_err());
        assert!(parse("C(C").is_err());
        assert!(parse("CC)").is_err());
        assert!(parse("C=").is_err());
        assert!(parse("[Xx]").is_err());
        assert!(parse("[CH4").is_err());
        assert!(parse("C1CCCCC=1").is_ok());
        assert_eq!(parse("C=1CCCCC#1"), Err(SmilesError::RingBondConflict { label: 1 }));
        assert_eq!(parse("cc"), Err(SmilesError::NonRingAromatic { atom: 0 }));
    }

    #[test]
    fn test_out_of_range_bracket_counts() {
        assert_eq!(parse("[C-127]").unwrap().atoms()[0].charge, -127);
        assert_eq!(parse("[N+++]").unwrap().atoms()[0].charge, 3);
        assert_eq!(
            parse("[C-128]"),
            Err(SmilesError::OutOfRange { what: "charge", position: 2 })
        );
        let many_signs = format!("[C{}]", "-".repeat(200));
        assert!(matches!(
            parse(&many_signs),
            Err(SmilesError::OutOfRange { what: "charge", .. })
        ));
        assert_eq!(
            parse("[CH300]"),
            Err(SmilesError::OutOfRange { what: "hydrogen count", position: 2 })
        );
        assert!(matches!(
            parse("[70000C]"),
            Err(SmilesError::OutOfRange { what: "isotope", .. })
        ));
        assert!(matches!(
            parse("[CH99999999999]"),
            Err(SmilesError::OutOfRange { what: "number", .. })
        ));
    }

    #[test]
    fn test_atom_limit() {
        assert_eq!(parse(&"C".repeat(MAX_ATOMS)).unwrap().atom_count(), MAX_ATOMS);
        assert_eq!(
            parse(&"C".repeat(MAX_ATOMS + 1)),
            Err(SmilesError::TooManyAtoms { limit: MAX_ATOMS })
        );
    }

    #[test]
    fn test_crowded_atom_valence() {
        // one carbon with 300 neighbors
        let text = format!("C{}C", "(C)".repeat(300));
        let mol = parse(&text).unwrap();
        assert_eq!(mol.valence_sum(0), 301);
        assert_eq!(mol.implicit_hydrogens(0), 0);
    }
}
