//! Pipeline artifact loader

use super::native::NativePipeline;
use super::onnx::OnnxPipeline;
use super::pipeline::InferencePipeline;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// On-disk encoding of a pipeline artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Onnx,
    Native,
}

impl ArtifactFormat {
    /// Infer the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("onnx") => Ok(ArtifactFormat::Onnx),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(ArtifactFormat::Native),
            _ => bail!("Cannot infer artifact format of {}", path.display()),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Onnx => "onnx",
            ArtifactFormat::Native => "json",
        }
    }
}

/// Loaded pipeline with metadata
pub struct LoadedModel {
    /// Model name
    pub name: String,
    pub format: ArtifactFormat,
    pub pipeline: Box<dyn InferencePipeline>,
}

/// Loader for pipeline artifacts
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
    onnx_ready: AtomicBool,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
            onnx_ready: AtomicBool::new(false),
        }
    }

    /// ONNX Runtime is only initialized once an ONNX artifact is loaded
    fn ensure_onnx_runtime(&self) -> Result<()> {
        if !self.onnx_ready.load(Ordering::Acquire) {
            ort::init().commit()?;
            self.onnx_ready.store(true, Ordering::Release);
            info!(onnx_threads = self.onnx_threads, "ONNX Runtime initialized");
        }
        Ok(())
    }

    /// Load an artifact file, inferring its format from the extension
    pub fn load_file<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<LoadedModel> {
        let path = path.as_ref();
        let format = ArtifactFormat::from_path(path)?;

        let pipeline: Box<dyn InferencePipeline> = match format {
            ArtifactFormat::Onnx => {
                self.ensure_onnx_runtime()?;
                Box::new(OnnxPipeline::from_file(path, name, self.onnx_threads)?)
            }
            ArtifactFormat::Native => {
                let bytes = fs::read(path)
                    .with_context(|| format!("Failed to read artifact {}", path.display()))?;
                Box::new(NativePipeline::from_json(&bytes)?)
            }
        };

        info!(model = %name, format = ?format, path = %path.display(), "Pipeline loaded");

        Ok(LoadedModel {
            name: name.to_string(),
            format,
            pipeline,
        })
    }

    /// Load an artifact from raw bytes
    pub fn load_bytes(&self, bytes: &[u8], format: ArtifactFormat, name: &str) -> Result<LoadedModel> {
        let pipeline: Box<dyn InferencePipeline> = match format {
            ArtifactFormat::Onnx => {
                self.ensure_onnx_runtime()?;
                Box::new(OnnxPipeline::from_memory(bytes, name, self.onnx_threads)?)
            }
            ArtifactFormat::Native => Box::new(NativePipeline::from_json(bytes)?),
        };

        Ok(LoadedModel {
            name: name.to_string(),
            format,
            pipeline,
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pipeline::PipelineInput;
    use std::io::Write;

    const NATIVE: &str = r#"{"estimator": "linear_regression", "intercept": 2.0, "descriptor_coefficients": [1.0]}"#;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ArtifactFormat::from_path(Path::new("model.ONNX")).unwrap(),
            ArtifactFormat::Onnx
        );
        assert_eq!(
            ArtifactFormat::from_path(Path::new("dir/model.json")).unwrap(),
            ArtifactFormat::Native
        );
        assert!(ArtifactFormat::from_path(Path::new("model.pkl")).is_err());
        assert!(ArtifactFormat::from_path(Path::new("model")).is_err());
    }

    #[test]
    fn test_load_native_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(NATIVE.as_bytes()).unwrap();

        let loader = ModelLoader::new();
        let mut model = loader.load_file(file.path(), "solubility").unwrap();
        assert_eq!(model.name, "solubility");
        assert_eq!(model.format, ArtifactFormat::Native);
        let out = model.pipeline.predict(PipelineInput::Vector(&[3.0])).unwrap();
        assert_eq!(out, vec![5.0]);
    }

    #[test]
    fn test_load_native_bytes_rejects_garbage() {
        let loader = ModelLoader::default();
        assert!(loader
            .load_bytes(b"not json", ArtifactFormat::Native, "broken")
            .is_err());
        assert!(loader
            .load_bytes(NATIVE.as_bytes(), ArtifactFormat::Native, "ok")
            .is_ok());
    }
}
