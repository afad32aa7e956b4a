//! Prediction dispatch by model input type

use super::pipeline::{AtomContributions, InferencePipeline, PipelineInput};
use crate::chem::{Canonicalizer, GraphCanonicalizer};
use crate::error::{PredictError, PredictResult};
use crate::render::{ContributionRenderer, RendererConfig};
use crate::resolver::{FieldResolver, ResolvedBatch};
use crate::types::table::{
    COLOR_ATOM_COLUMN, NO_VALID_RECORDS, PREDICTED_COLUMN, REAL_COLUMN,
};
use crate::types::{InputType, ModelMetadata, PredictionOutput, ResultTable, Value, SMILES_KEY};
use tracing::{debug, info};

/// `ColorAtom` cell for classification models
pub const CLASSIFIER_PLACEHOLDER: &str = "not available for classification models yet";

/// Named input values in caller order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputValues {
    entries: Vec<(String, String)>,
}

impl InputValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Input for SMILES models
    pub fn smiles(text: &str) -> Self {
        let mut values = Self::new();
        values.insert(SMILES_KEY, text);
        values
    }

    /// Set a value; an existing name keeps its position
    pub fn insert(&mut self, name: &str, value: &str) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for InputValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = Self::new();
        for (name, value) in iter {
            values.insert(name.as_ref(), value.as_ref());
        }
        values
    }
}

/// Routes a request to the descriptors or SMILES path
pub struct PredictionDispatcher<C = GraphCanonicalizer> {
    resolver: FieldResolver<C>,
    renderer: ContributionRenderer,
}

impl PredictionDispatcher<GraphCanonicalizer> {
    pub fn new(config: RendererConfig) -> Self {
        Self::with_resolver(FieldResolver::new(), ContributionRenderer::new(config))
    }
}

impl Default for PredictionDispatcher<GraphCanonicalizer> {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}

impl<C: Canonicalizer> PredictionDispatcher<C> {
    pub fn with_resolver(resolver: FieldResolver<C>, renderer: ContributionRenderer) -> Self {
        Self { resolver, renderer }
    }

    pub fn dispatch(
        &self,
        pipeline: &mut dyn InferencePipeline,
        metadata: &ModelMetadata,
        inputs: &InputValues,
        color_atoms: bool,
    ) -> PredictResult<PredictionOutput> {
        match metadata.input_type {
            InputType::DescriptorsValues => self
                .predict_descriptors(pipeline, inputs)
                .map(PredictionOutput::Scalar),
            InputType::Smiles => self
                .predict_smiles(pipeline, metadata, inputs, color_atoms)
                .map(PredictionOutput::Table),
        }
    }

    fn predict_descriptors(
        &self,
        pipeline: &mut dyn InferencePipeline,
        inputs: &InputValues,
    ) -> PredictResult<f64> {
        let features = inputs
            .iter()
            .map(|(name, value)| {
                value
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| PredictError::InvalidDescriptor {
                        name: name.to_string(),
                        value: value.to_string(),
                    })
            })
            .collect::<PredictResult<Vec<f64>>>()?;
        debug!(features = ?features, "Descriptor input");

        let predictions = pipeline.predict(PipelineInput::Vector(&features))?;
        predictions
            .first()
            .copied()
            .ok_or(PredictError::PredictionCount {
                expected: 1,
                actual: 0,
            })
    }

    fn predict_smiles(
        &self,
        pipeline: &mut dyn InferencePipeline,
        metadata: &ModelMetadata,
        inputs: &InputValues,
        color_atoms: bool,
    ) -> PredictResult<ResultTable> {
        let text = inputs
            .get(SMILES_KEY)
            .ok_or_else(|| PredictError::MissingSmiles(SMILES_KEY.to_string()))?;
        let fields = metadata.fields();
        let batch = self.resolver.resolve_text(text, &fields);

        if batch.is_empty() {
            info!(lines = batch.stats.lines, "No record resolved");
            return Ok(ResultTable::error(NO_VALID_RECORDS).with_stats(batch.stats));
        }

        let predictions = if fields.len() == 1 {
            let column = batch.column(0);
            pipeline.predict(PipelineInput::Column(&column))?
        } else {
            pipeline.predict(PipelineInput::Table(&batch))?
        };
        if predictions.len() != batch.records.len() {
            return Err(PredictError::PredictionCount {
                expected: batch.records.len(),
                actual: predictions.len(),
            });
        }

        let mut table = ResultTable::new(fields.clone()).with_stats(batch.stats);
        for record in &batch.records {
            table.push_row(record.values.clone())?;
        }
        if batch.has_real_values() {
            table.push_column(
                REAL_COLUMN,
                batch.records.iter().map(|r| Value::from(r.real)).collect(),
            )?;
        }
        table.push_column(
            PREDICTED_COLUMN,
            predictions.into_iter().map(Value::Number).collect(),
        )?;

        if color_atoms {
            self.add_color_atoms(&mut table, pipeline, &batch)?;
        }

        for field in &fields {
            table.map_column(field, Value::stringify_molecule);
        }

        debug!(
            records = table.len(),
            dropped = batch.stats.dropped,
            "SMILES prediction complete"
        );
        Ok(table)
    }

    fn add_color_atoms(
        &self,
        table: &mut ResultTable,
        pipeline: &dyn InferencePipeline,
        batch: &ResolvedBatch,
    ) -> PredictResult<()> {
        if pipeline.is_classifier() {
            let cells = vec![Value::Text(CLASSIFIER_PLACEHOLDER.to_string()); table.len()];
            return table.push_column(COLOR_ATOM_COLUMN, cells);
        }

        let contributions = batch
            .records
            .iter()
            .map(|record| pipeline.atom_contributions(&batch.fields, record))
            .collect::<anyhow::Result<Vec<AtomContributions>>>()?;
        let rendered = self
            .renderer
            .render_batch(&batch.fields, &batch.records, &contributions);
        debug!(min = rendered.scale.min, max = rendered.scale.max, "Color scale");

        table.push_column(
            COLOR_ATOM_COLUMN,
            rendered.cells.into_iter().map(Value::Text).collect(),
        )?;

        let mut legend_row = vec![Value::Null; table.columns().len() - 1];
        legend_row.push(Value::Text(rendered.legend));
        table.push_row(legend_row)
    }
}
