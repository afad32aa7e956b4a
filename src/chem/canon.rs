//! Canonical atom ranking and canonical SMILES output

use super::molecule::{default_hydrogens, is_organic_subset, BondOrder, Molecule};
use super::smiles::{self, SmilesError};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

/// Highest ring-closure label SMILES can express (`%99`)
const MAX_RING_LABELS: u16 = 99;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonicalizeError {
    #[error("more than 99 ring closures open at once")]
    RingLabelsExhausted,

    #[error("canonical form '{smiles}' does not re-parse: {source}")]
    Reparse {
        smiles: String,
        #[source]
        source: SmilesError,
    },
}

/// Normalizes a molecule to one standard representation
pub trait Canonicalizer {
    /// Returns the canonical molecule: atoms renumbered in canonical order and
    /// the canonical SMILES attached.
    fn canonicalize(&self, molecule: &Molecule) -> Result<Molecule, CanonicalizeError>;

    /// Canonicalize with one retry before giving up
    fn canonicalize_retrying(&self, molecule: &Molecule) -> Result<Molecule, CanonicalizeError> {
        self.canonicalize(molecule).or_else(|first| {
            debug!(smiles = %molecule, error = %first, "Canonicalization failed, retrying");
            self.canonicalize(molecule)
        })
    }
}

/// Canonicalizer based on iterative invariant refinement
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphCanonicalizer;

impl Canonicalizer for GraphCanonicalizer {
    fn canonicalize(&self, molecule: &Molecule) -> Result<Molecule, CanonicalizeError> {
        let ranks = canonical_ranks(molecule);
        let text = write_smiles(molecule, &ranks)?;
        let mut canonical = smiles::parse(&text).map_err(|source| CanonicalizeError::Reparse {
            smiles: text.clone(),
            source,
        })?;
        canonical.set_canonical(text);
        Ok(canonical)
    }
}

/// Unique rank per atom; equal graphs yield equal rank patterns.
pub fn canonical_ranks(mol: &Molecule) -> Vec<usize> {
    let n = mol.atom_count();
    if n == 0 {
        return Vec::new();
    }
    let invariants: Vec<_> = (0..n)
        .map(|a| {
            let atom = &mol.atoms()[a];
            (
                atom.atomic_number,
                atom.isotope.unwrap_or(0),
                atom.aromatic,
                mol.degree(a),
                mol.implicit_hydrogens(a),
                atom.charge,
                mol.in_ring(a),
            )
        })
        .collect();
    let mut ranks = dense_ranks(&invariants);

    loop {
        ranks = refine(mol, ranks);
        if class_count(&ranks) == n {
            return ranks;
        }
        // break the lowest tie and refine again
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for &r in &ranks {
            *counts.entry(r).or_default() += 1;
        }
        let tied = counts
            .iter()
            .find(|(_, &count)| count > 1)
            .map(|(&rank, _)| rank)
            .unwrap_or(0);
        let chosen = ranks.iter().position(|&r| r == tied).unwrap_or(0);
        ranks = ranks
            .iter()
            .enumerate()
            .map(|(atom, &r)| if atom == chosen { 2 * r } else { 2 * r + 1 })
            .collect();
    }
}

fn refine(mol: &Molecule, mut ranks: Vec<usize>) -> Vec<usize> {
    loop {
        let keys: Vec<(usize, Vec<(usize, u8)>)> = (0..mol.atom_count())
            .map(|a| {
                let mut around: Vec<(usize, u8)> = mol
                    .neighbors(a)
                    .map(|(nbr, order)| (ranks[nbr], order.code()))
                    .collect();
                around.sort_unstable();
                (ranks[a], around)
            })
            .collect();
        let refined = dense_ranks(&keys);
        if class_count(&refined) == class_count(&ranks) {
            return refined;
        }
        ranks = refined;
    }
}

fn dense_ranks<K: Ord + Clone>(keys: &[K]) -> Vec<usize> {
    let mut sorted: Vec<K> = keys.to_vec();
    sorted.sort();
    sorted.dedup();
    keys.iter()
        .map(|k| sorted.binary_search(k).unwrap_or(0))
        .collect()
}

fn class_count(ranks: &[usize]) -> usize {
    ranks.iter().collect::<HashSet<_>>().len()
}

/// Write SMILES visiting atoms in rank order
pub fn write_smiles(mol: &Molecule, ranks: &[usize]) -> Result<String, CanonicalizeError> {
    let mut parts = Vec::new();
    for component in mol.components() {
        let Some(&start) = component.iter().min_by_key(|&&a| ranks[a]) else {
            continue;
        };
        let tree = SpanningTree::build(mol, ranks, start);
        let mut writer = ComponentWriter {
            mol,
            ranks,
            tree: &tree,
            open: HashMap::new(),
            used_labels: HashSet::new(),
            out: String::new(),
        };
        writer.write(start)?;
        parts.push(writer.out);
    }
    parts.sort();
    Ok(parts.join("."))
}

struct SpanningTree {
    children: Vec<Vec<usize>>,
    /// bond indices closed by ring-closure labels
    closures: HashSet<usize>,
}

/// Depth-first position: the atom, where it was entered from and how many of
/// its sorted neighbors were already looked at
struct Visit {
    atom: usize,
    parent: Option<usize>,
    neighbors: Vec<usize>,
    next: usize,
}

impl SpanningTree {
    fn build(mol: &Molecule, ranks: &[usize], start: usize) -> Self {
        let mut tree = Self {
            children: vec![Vec::new(); mol.atom_count()],
            closures: HashSet::new(),
        };
        let mut visited = vec![false; mol.atom_count()];
        visited[start] = true;
        let mut stack = vec![Visit {
            atom: start,
            parent: None,
            neighbors: sorted_neighbors(mol, ranks, start),
            next: 0,
        }];

        while let Some(visit) = stack.last_mut() {
            if visit.next == visit.neighbors.len() {
                stack.pop();
                continue;
            }
            let next = visit.neighbors[visit.next];
            visit.next += 1;
            let atom = visit.atom;
            if Some(next) == visit.parent {
                continue;
            }
            if visited[next] {
                if let Some(bond) = mol.bond_index(atom, next) {
                    tree.closures.insert(bond);
                }
            } else {
                visited[next] = true;
                tree.children[atom].push(next);
                stack.push(Visit {
                    atom: next,
                    parent: Some(atom),
                    neighbors: sorted_neighbors(mol, ranks, next),
                    next: 0,
                });
            }
        }
        tree
    }
}

fn sorted_neighbors(mol: &Molecule, ranks: &[usize], atom: usize) -> Vec<usize> {
    let mut neighbors: Vec<usize> = mol.neighbors(atom).map(|(n, _)| n).collect();
    neighbors.sort_by_key(|&n| ranks[n]);
    neighbors
}

enum Step {
    Atom {
        atom: usize,
        parent: Option<usize>,
        branch: bool,
    },
    CloseBranch,
}

struct ComponentWriter<'a> {
    mol: &'a Molecule,
    ranks: &'a [usize],
    tree: &'a SpanningTree,
    /// bond index -> label while the closure is open
    open: HashMap<usize, u16>,
    used_labels: HashSet<u16>,
    out: String,
}

impl ComponentWriter<'_> {
    /// Emit the spanning tree rooted at `start`; every child except the last
    /// becomes a parenthesized branch
    fn write(&mut self, start: usize) -> Result<(), CanonicalizeError> {
        let mut steps = vec![Step::Atom {
            atom: start,
            parent: None,
            branch: false,
        }];
        while let Some(step) = steps.pop() {
            let (atom, parent, branch) = match step {
                Step::CloseBranch => {
                    self.out.push(')');
                    continue;
                }
                Step::Atom {
                    atom,
                    parent,
                    branch,
                } => (atom, parent, branch),
            };
            if branch {
                self.out.push('(');
            }
            self.write_atom(atom, parent)?;

            let children = &self.tree.children[atom];
            for (i, &child) in children.iter().enumerate().rev() {
                let last = i + 1 == children.len();
                if !last {
                    steps.push(Step::CloseBranch);
                }
                steps.push(Step::Atom {
                    atom: child,
                    parent: Some(atom),
                    branch: !last,
                });
            }
        }
        Ok(())
    }

    fn write_atom(&mut self, atom: usize, parent: Option<usize>) -> Result<(), CanonicalizeError> {
        if let Some(parent) = parent {
            let bond = self.bond_symbol(parent, atom);
            self.out.push_str(bond);
        }
        let text = atom_text(self.mol, atom);
        self.out.push_str(&text);

        let closing: Vec<usize> = sorted_neighbors(self.mol, self.ranks, atom)
            .into_iter()
            .filter(|&n| {
                self.mol
                    .bond_index(atom, n)
                    .is_some_and(|b| self.tree.closures.contains(&b))
            })
            .collect();
        for other in closing {
            let Some(bond) = self.mol.bond_index(atom, other) else {
                continue;
            };
            match self.open.remove(&bond) {
                Some(label) => {
                    self.used_labels.remove(&label);
                    push_label(&mut self.out, label);
                }
                None => {
                    let label = (1..=MAX_RING_LABELS)
                        .find(|l| !self.used_labels.contains(l))
                        .ok_or(CanonicalizeError::RingLabelsExhausted)?;
                    self.used_labels.insert(label);
                    self.open.insert(bond, label);
                    let symbol = self.bond_symbol(atom, other);
                    self.out.push_str(symbol);
                    push_label(&mut self.out, label);
                }
            }
        }
        Ok(())
    }

    fn bond_symbol(&self, a: usize, b: usize) -> &'static str {
        let both_aromatic = self.mol.atoms()[a].aromatic && self.mol.atoms()[b].aromatic;
        match self.mol.bond_between(a, b).map(|bond| bond.order) {
            Some(BondOrder::Single) if both_aromatic => "-",
            Some(BondOrder::Aromatic) if !both_aromatic => ":",
            Some(BondOrder::Double) => "=",
            Some(BondOrder::Triple) => "#",
            Some(BondOrder::Quadruple) => "$",
            _ => "",
        }
    }
}

fn push_label(out: &mut String, label: u16) {
    if label < 10 {
        out.push_str(&label.to_string());
    } else {
        out.push_str(&format!("%{label:02}"));
    }
}

fn atom_text(mol: &Molecule, index: usize) -> String {
    let atom = &mol.atoms()[index];
    let hydrogens = mol.implicit_hydrogens(index);
    let symbol = if atom.aromatic {
        atom.symbol.to_ascii_lowercase()
    } else {
        atom.symbol.clone()
    };

    let aromatic_ok = !atom.aromatic || matches!(atom.atomic_number, 5 | 6 | 7 | 8 | 15 | 16);
    let bare = is_organic_subset(atom.atomic_number)
        && aromatic_ok
        && atom.charge == 0
        && atom.isotope.is_none()
        && hydrogens == default_hydrogens(atom, mol.valence_sum(index));
    if bare {
        return symbol;
    }

    let mut text = String::from("[");
    if let Some(isotope) = atom.isotope {
        text.push_str(&isotope.to_string());
    }
    text.push_str(&symbol);
    match hydrogens {
        0 => {}
        1 => text.push('H'),
        h => text.push_str(&format!("H{h}")),
    }
    match atom.charge {
        0 => {}
        1 => text.push('+'),
        -1 => text.push('-'),
        c if c > 0 => text.push_str(&format!("+{c}")),
        c => text.push_str(&format!("-{}", c.unsigned_abs())),
    }
    text.push(']');
    text
}
