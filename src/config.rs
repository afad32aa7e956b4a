//! Configuration management for the prediction service

use crate::render::RendererConfig;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub models: ModelsConfig,
    #[serde(default)]
    pub rendering: RendererConfig,
    pub logging: LoggingConfig,
}

/// Model store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory holding stored artifacts and their records
    pub store_dir: String,
    /// Number of threads for ONNX inference per model (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
    /// Keep loaded pipelines in memory between predictions
    #[serde(default)]
    pub cache_artifacts: bool,
}

fn default_onnx_threads() -> usize {
    1
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

/// Filter used when neither `RUST_LOG` nor `logging.level` is set
pub const DEFAULT_LOG_DIRECTIVE: &str = "mads_predict=info";

impl LoggingConfig {
    /// `EnvFilter` directives for the configured level
    pub fn directives(&self) -> &str {
        match self.level.trim() {
            "" => DEFAULT_LOG_DIRECTIVE,
            level => level,
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models: ModelsConfig {
                store_dir: "models".to_string(),
                onnx_threads: 1,
                cache_artifacts: false,
            },
            rendering: RendererConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
