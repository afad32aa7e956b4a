//! ONNX Runtime backed pipelines

use super::pipeline::{AtomContributions, InferencePipeline, PipelineInput};
use crate::error::PredictError;
use crate::resolver::ResolvedRecord;
use anyhow::{anyhow, Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::Tensor;
use std::path::Path;
use tracing::{debug, info};

/// ONNX session with resolved input and output names.
///
/// Only descriptor vectors are accepted; structure featurization is not part
/// of exported graphs.
pub struct OnnxPipeline {
    name: String,
    session: Session,
    input_name: String,
    output_name: String,
    classifier: bool,
}

impl OnnxPipeline {
    pub fn from_file<P: AsRef<Path>>(path: P, name: &str, threads: usize) -> Result<Self> {
        let path = path.as_ref();
        info!(model = %name, path = %path.display(), threads = threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        Ok(Self::from_session(session, name))
    }

    pub fn from_memory(bytes: &[u8], name: &str, threads: usize) -> Result<Self> {
        info!(model = %name, size = bytes.len(), threads = threads, "Loading ONNX model from memory");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_memory(bytes)
            .context("Failed to load model from memory")?;

        Ok(Self::from_session(session, name))
    }

    fn from_session(session: Session, name: &str) -> Self {
        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        // classifier exports carry a "label" output next to the probabilities
        let label = session
            .outputs
            .iter()
            .find(|o| o.name == "label" || o.name == "output_label")
            .map(|o| o.name.clone());
        let classifier = label.is_some();

        let output_name = label.unwrap_or_else(|| {
            session
                .outputs
                .first()
                .map(|o| o.name.clone())
                .unwrap_or_else(|| "variable".to_string())
        });

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            classifier = classifier,
            "Model loaded successfully"
        );

        Self {
            name: name.to_string(),
            session,
            input_name,
            output_name,
            classifier,
        }
    }

    fn run(&mut self, features: &[f64]) -> Result<f64> {
        // Prepare input tensor - shape [1, num_features]
        let data: Vec<f32> = features.iter().map(|&v| v as f32).collect();
        let shape = vec![1_i64, data.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, data)).context("Failed to create input tensor")?;

        let outputs = self
            .session
            .run(ort::inputs![&self.input_name => input_tensor])?;

        let value = extract_value(&outputs, &self.output_name)
            .with_context(|| format!("Model '{}' produced no usable output", self.name))?;
        debug!(model = %self.name, value = value, "ONNX inference complete");
        Ok(value)
    }
}

/// First element of the named output, as f32, f64 or i64 tensor
fn extract_value(outputs: &SessionOutputs, output_name: &str) -> Result<f64> {
    let output = outputs
        .get(output_name)
        .ok_or_else(|| anyhow!("missing output '{}'", output_name))?;

    if let Ok((_, data)) = output.try_extract_tensor::<f32>() {
        return data
            .first()
            .map(|&v| v as f64)
            .ok_or_else(|| anyhow!("empty output tensor"));
    }
    if let Ok((_, data)) = output.try_extract_tensor::<f64>() {
        return data.first().copied().ok_or_else(|| anyhow!("empty output tensor"));
    }
    if let Ok((_, data)) = output.try_extract_tensor::<i64>() {
        return data
            .first()
            .map(|&v| v as f64)
            .ok_or_else(|| anyhow!("empty output tensor"));
    }
    Err(anyhow!("output '{}' is not a numeric tensor", output_name))
}

impl InferencePipeline for OnnxPipeline {
    fn predict(&mut self, input: PipelineInput<'_>) -> Result<Vec<f64>> {
        match input {
            PipelineInput::Vector(features) => Ok(vec![self.run(features)?]),
            other => Err(PredictError::UnsupportedInput(other.kind()).into()),
        }
    }

    fn is_classifier(&self) -> bool {
        self.classifier
    }

    fn atom_contributions(
        &self,
        _fields: &[String],
        _record: &ResolvedRecord,
    ) -> Result<AtomContributions> {
        Err(anyhow!(
            "model '{}' does not expose atom contributions",
            self.name
        ))
    }
}
