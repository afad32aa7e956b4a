//! Native JSON pipelines: fragment featurizer plus linear scorer.
//!
//! The score of a record is the intercept plus, per field, either the sum of
//! its atoms' fragment weights (structures), a weighted number, or a one-hot
//! solvent weight. Atom contributions are exact shares of that score.

use super::pipeline::{AtomContributions, EstimatorKind, InferencePipeline, PipelineInput};
use crate::chem::Molecule;
use crate::error::PredictError;
use crate::features::FragmentFeaturizer;
use crate::resolver::ResolvedRecord;
use crate::types::Value;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

fn default_radius() -> usize {
    1
}

/// Serialized native pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativePipeline {
    pub estimator: EstimatorKind,

    #[serde(default = "default_radius")]
    pub fragment_radius: usize,

    #[serde(default)]
    pub intercept: f64,

    /// Weights of descriptor vectors, in training feature order
    #[serde(default)]
    pub descriptor_coefficients: Vec<f64>,

    /// Fragment key -> weight
    #[serde(default)]
    pub fragment_weights: HashMap<String, f64>,

    /// Numeric field -> weight
    #[serde(default)]
    pub numeric_weights: HashMap<String, f64>,

    /// Categorical field -> category -> weight; unknown categories weigh 0
    #[serde(default)]
    pub category_weights: HashMap<String, HashMap<String, f64>>,
}

impl NativePipeline {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("Failed to parse native pipeline")
    }

    fn featurizer(&self) -> FragmentFeaturizer {
        FragmentFeaturizer::new(self.fragment_radius)
    }

    /// Contribution of every atom of `mol`
    pub fn molecule_contributions(&self, mol: &Molecule) -> BTreeMap<usize, f64> {
        self.featurizer()
            .atom_fragments(mol)
            .iter()
            .enumerate()
            .map(|(atom, keys)| {
                let weight = keys
                    .iter()
                    .filter_map(|k| self.fragment_weights.get(k))
                    .sum::<f64>();
                (atom, weight)
            })
            .collect()
    }

    fn molecule_score(&self, mol: &Molecule) -> f64 {
        self.molecule_contributions(mol).values().sum()
    }

    fn value_score(&self, field: &str, value: &Value) -> Result<f64> {
        match value {
            Value::Molecule(mol) => Ok(self.molecule_score(mol)),
            Value::Number(x) => Ok(self.numeric_weights.get(field).copied().unwrap_or(0.0) * x),
            Value::Category(name) => Ok(self
                .category_weights
                .get(field)
                .and_then(|weights| weights.get(name))
                .copied()
                .unwrap_or(0.0)),
            Value::Text(_) | Value::Null => {
                bail!("field '{}' holds a value the pipeline cannot score", field)
            }
        }
    }

    fn output(&self, score: f64) -> f64 {
        if self.estimator.is_classifier() {
            if score >= 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            score
        }
    }
}

impl InferencePipeline for NativePipeline {
    fn predict(&mut self, input: PipelineInput<'_>) -> Result<Vec<f64>> {
        match input {
            PipelineInput::Vector(features) => {
                if features.len() != self.descriptor_coefficients.len() {
                    bail!(
                        "expected {} descriptors, got {}",
                        self.descriptor_coefficients.len(),
                        features.len()
                    );
                }
                let score = self.intercept
                    + features
                        .iter()
                        .zip(&self.descriptor_coefficients)
                        .map(|(x, w)| x * w)
                        .sum::<f64>();
                Ok(vec![self.output(score)])
            }
            PipelineInput::Column(values) => values
                .iter()
                .map(|value| match value {
                    Value::Molecule(mol) => Ok(self.output(self.intercept + self.molecule_score(mol))),
                    other => bail!("column input expects structures, got '{}'", other),
                })
                .collect(),
            PipelineInput::Table(batch) => batch
                .records
                .iter()
                .map(|record| {
                    let mut score = self.intercept;
                    for (field, value) in batch.fields.iter().zip(&record.values) {
                        score += self.value_score(field, value)?;
                    }
                    Ok(self.output(score))
                })
                .collect(),
        }
    }

    fn is_classifier(&self) -> bool {
        self.estimator.is_classifier()
    }

    fn atom_contributions(
        &self,
        fields: &[String],
        record: &ResolvedRecord,
    ) -> Result<AtomContributions> {
        if record.values.len() != fields.len() {
            return Err(PredictError::ColumnLength {
                column: "record".to_string(),
                expected: fields.len(),
                actual: record.values.len(),
            }
            .into());
        }
        Ok(fields
            .iter()
            .zip(&record.values)
            .filter_map(|(field, value)| {
                value
                    .as_molecule()
                    .map(|mol| (field.clone(), self.molecule_contributions(mol)))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::FieldResolver;

    fn pipeline() -> NativePipeline {
        NativePipeline::from_json(
            br#"{
                "estimator": "ridge",
                "fragment_radius": 0,
                "intercept": 1.0,
                "descriptor_coefficients": [2.0, -1.0],
                "fragment_weights": {"C;H3": 0.5, "O;H1": -2.0, "C;H2": 0.25},
                "numeric_weights": {"Temperature": 0.1},
                "category_weights": {"Solvent": {"water": 3.0}}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_vector_prediction() {
        let mut model = pipeline();
        let out = model.predict(PipelineInput::Vector(&[3.0, 4.0])).unwrap();
        assert_eq!(out, vec![1.0 + 6.0 - 4.0]);
        assert!(model.predict(PipelineInput::Vector(&[1.0])).is_err());
    }

    #[test]
    fn test_column_prediction_sums_atom_contributions() {
        let mut model = pipeline();
        let resolver = FieldResolver::new();
        let ethanol = resolver.resolve_token("CCO").unwrap();
        let column = [&ethanol];
        let out = model.predict(PipelineInput::Column(&column)).unwrap();
        // 1.0 + 0.5 + 0.25 - 2.0
        assert!((out[0] + 0.25).abs() < 1e-12);

        let number = Value::Number(1.0);
        assert!(model.predict(PipelineInput::Column(&[&number])).is_err());
    }

    #[test]
    fn test_table_prediction() {
        let mut model = pipeline();
        let resolver = FieldResolver::new();
        let fields: Vec<String> = ["SMILES", "Solvent", "Temperature"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let batch = resolver.resolve_text("CCO water 300\nCCO DMSO 300", &fields);
        let out = model.predict(PipelineInput::Table(&batch)).unwrap();
        assert_eq!(out.len(), 2);
        assert!((out[0] - (-0.25 + 3.0 + 30.0)).abs() < 1e-9);
        assert!((out[1] - (-0.25 + 30.0)).abs() < 1e-9);
    }

    #[test]
    fn test_classifier_thresholds_score() {
        let mut model = pipeline();
        model.estimator = EstimatorKind::Svc;
        assert!(model.is_classifier());
        let out = model.predict(PipelineInput::Vector(&[0.0, 5.0])).unwrap();
        assert_eq!(out, vec![0.0]);
    }

    #[test]
    fn test_contributions_per_field_and_atom() {
        let model = pipeline();
        let resolver = FieldResolver::new();
        let fields = vec!["SMILES".to_string(), "Solvent".to_string()];
        let record = resolver
            .resolve_line(&["CCO".to_string(), "water".to_string()], &fields)
            .unwrap();
        let contributions = model.atom_contributions(&fields, &record).unwrap();
        assert_eq!(contributions.len(), 1);
        let atoms = &contributions["SMILES"];
        assert_eq!(atoms.len(), 3);
        let total: f64 = atoms.values().sum();
        assert!((total + 1.25).abs() < 1e-12);
    }
}
