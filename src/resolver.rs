//! Field resolution for SMILES batch input.
//!
//! Every token is tried as a chemical structure first, then as a number,
//! then as a whitelisted solvent name. A line with any unresolvable token is
//! dropped as a whole; dropped lines are counted but not reported one by one.

use crate::chem::{
    smiles, solvents, CanonicalizeError, Canonicalizer, GraphCanonicalizer, SmilesError,
};
use crate::parser::parse_lines;
use crate::types::{BatchStats, Value};
use thiserror::Error;
use tracing::debug;

/// Why a line did not become a record
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("no token for field '{field}'")]
    MissingToken { field: String },

    #[error("empty token at position {position}")]
    EmptyToken { position: usize },

    #[error("'{token}' is neither a structure, a number nor a known solvent")]
    Unresolvable { token: String },

    #[error("'{token}' could not be canonicalized: {error}")]
    Canonicalization {
        token: String,
        error: CanonicalizeError,
    },

    #[error("trailing value '{token}' is not a number")]
    InvalidReal { token: String },

    #[error("structure has more than {limit} atoms")]
    TooLarge { limit: usize },
}

/// One accepted input line
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRecord {
    /// One value per declared field, in field order
    pub values: Vec<Value>,
    /// Ground-truth value given after the declared fields
    pub real: Option<f64>,
}

/// All accepted lines of one input blob
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBatch {
    pub fields: Vec<String>,
    pub records: Vec<ResolvedRecord>,
    pub stats: BatchStats,
}

impl ResolvedBatch {
    /// Values of the field at `index` across all records
    pub fn column(&self, index: usize) -> Vec<&Value> {
        self.records.iter().map(|r| &r.values[index]).collect()
    }

    pub fn has_real_values(&self) -> bool {
        self.records.iter().any(|r| r.real.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Maps tokens onto declared fields
#[derive(Debug, Clone, Default)]
pub struct FieldResolver<C = GraphCanonicalizer> {
    canonicalizer: C,
}

impl FieldResolver<GraphCanonicalizer> {
    pub fn new() -> Self {
        Self::with_canonicalizer(GraphCanonicalizer)
    }
}

impl<C: Canonicalizer> FieldResolver<C> {
    pub fn with_canonicalizer(canonicalizer: C) -> Self {
        Self { canonicalizer }
    }

    /// Parse and resolve every non-empty line of `text`
    pub fn resolve_text(&self, text: &str, fields: &[String]) -> ResolvedBatch {
        let mut stats = BatchStats::default();
        let mut records = Vec::new();

        for tokens in parse_lines(text) {
            stats.lines += 1;
            match self.resolve_line(&tokens, fields) {
                Ok(record) => records.push(record),
                Err(rejection) => {
                    stats.dropped += 1;
                    debug!(line = stats.lines, reason = %rejection, "Dropping input line");
                }
            }
        }
        stats.resolved = records.len();

        ResolvedBatch {
            fields: fields.to_vec(),
            records,
            stats,
        }
    }

    /// Pair tokens with fields positionally. Tokens past the declared fields
    /// carry a ground-truth value, read from the last token.
    pub fn resolve_line(
        &self,
        tokens: &[String],
        fields: &[String],
    ) -> Result<ResolvedRecord, Rejection> {
        let mut values = Vec::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            let token = tokens.get(position).ok_or_else(|| Rejection::MissingToken {
                field: field.clone(),
            })?;
            if token.is_empty() {
                return Err(Rejection::EmptyToken { position });
            }
            values.push(self.resolve_token(token)?);
        }

        let real = match tokens.get(fields.len()..) {
            Some(extra) if !extra.is_empty() => {
                if extra[0].is_empty() {
                    return Err(Rejection::EmptyToken {
                        position: fields.len(),
                    });
                }
                let last = &extra[extra.len() - 1];
                let real = last.parse::<f64>().map_err(|_| Rejection::InvalidReal {
                    token: last.clone(),
                })?;
                Some(real)
            }
            _ => None,
        };

        Ok(ResolvedRecord { values, real })
    }

    /// Resolve a single token: structure, then number, then solvent
    pub fn resolve_token(&self, token: &str) -> Result<Value, Rejection> {
        match smiles::parse(token) {
            Ok(molecule) => {
                let canonical = self
                    .canonicalizer
                    .canonicalize_retrying(&molecule)
                    .map_err(|error| Rejection::Canonicalization {
                        token: token.to_string(),
                        error,
                    })?;
                Ok(Value::Molecule(canonical))
            }
            Err(SmilesError::TooManyAtoms { limit }) => Err(Rejection::TooLarge { limit }),
            Err(_) => {
                if let Ok(number) = token.parse::<f64>() {
                    Ok(Value::Number(number))
                } else if solvents::is_available(token) {
                    Ok(Value::Category(token.to_string()))
                } else {
                    Err(Rejection::Unresolvable {
                        token: token.to_string(),
                    })
                }
            }
        }
    }
}
