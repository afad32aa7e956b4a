//! Cell values of input records and result tables

use crate::chem::Molecule;
use std::fmt;

/// A single resolved field or result cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Canonicalized chemical structure
    Molecule(Molecule),
    /// Numeric input, prediction or ground-truth value
    Number(f64),
    /// Whitelisted categorical value (solvent name)
    Category(String),
    /// Free text (stringified molecules, rendered HTML, messages)
    Text(String),
    /// Missing value
    Null,
}

impl Value {
    pub fn as_molecule(&self) -> Option<&Molecule> {
        match self {
            Value::Molecule(mol) => Some(mol),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Category(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Replace a molecule by its canonical text; other values are kept
    pub fn stringify_molecule(self) -> Value {
        match self {
            Value::Molecule(mol) => Value::Text(mol.to_string()),
            other => other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Molecule(mol) => write!(f, "{mol}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Category(s) | Value::Text(s) => f.write_str(s),
            Value::Null => Ok(()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<Option<f64>> for Value {
    fn from(n: Option<f64>) -> Self {
        n.map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::smiles;

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(35.2).to_string(), "35.2");
        assert_eq!(Value::Category("water".into()).to_string(), "water");
        assert_eq!(Value::Null.to_string(), "");
        let mol = smiles::parse("CCO").unwrap();
        assert_eq!(Value::Molecule(mol).to_string(), "CCO");
    }

    #[test]
    fn test_stringify_molecule() {
        let mol = smiles::parse("CCO").unwrap();
        assert_eq!(
            Value::Molecule(mol).stringify_molecule(),
            Value::Text("CCO".to_string())
        );
        assert_eq!(Value::Number(1.0).stringify_molecule(), Value::Number(1.0));
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(Some(2.0)), Value::Number(2.0));
        assert!(Value::from(None::<f64>).is_null());
    }
}
