//! Inference pipeline abstraction

use crate::resolver::{ResolvedBatch, ResolvedRecord};
use crate::types::Value;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per molecule field, per atom index, the atom's share of the prediction
pub type AtomContributions = BTreeMap<String, BTreeMap<usize, f64>>;

/// Shape of the data handed to a pipeline
#[derive(Debug, Clone, Copy)]
pub enum PipelineInput<'a> {
    /// One descriptor vector
    Vector(&'a [f64]),
    /// Values of the single declared field, one per record
    Column(&'a [&'a Value]),
    /// All declared fields, aligned per record
    Table(&'a ResolvedBatch),
}

impl PipelineInput<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineInput::Vector(_) => "vector",
            PipelineInput::Column(_) => "column",
            PipelineInput::Table(_) => "table",
        }
    }

    /// Number of predictions the pipeline must return
    pub fn expected_len(&self) -> usize {
        match self {
            PipelineInput::Vector(_) => 1,
            PipelineInput::Column(values) => values.len(),
            PipelineInput::Table(batch) => batch.records.len(),
        }
    }
}

/// Family of the final estimator a pipeline was trained with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    LinearRegression,
    Ridge,
    Lasso,
    RandomForestRegressor,
    GradientBoosting,
    Svr,
    KernelRidge,
    MlpRegressor,
    Svc,
    RandomForestClassifier,
}

impl EstimatorKind {
    /// Classification estimators have no atom contribution rendering
    pub fn is_classifier(self) -> bool {
        matches!(self, EstimatorKind::Svc | EstimatorKind::RandomForestClassifier)
    }
}

/// A trained model ready for inference
pub trait InferencePipeline: Send {
    /// One prediction per vector, column value or table record
    fn predict(&mut self, input: PipelineInput<'_>) -> Result<Vec<f64>>;

    /// Whether the final estimator is a classifier
    fn is_classifier(&self) -> bool;

    /// Per-atom contributions of the molecule fields of one record
    fn atom_contributions(
        &self,
        fields: &[String],
        record: &ResolvedRecord,
    ) -> Result<AtomContributions>;
}
