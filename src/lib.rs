//! MADS Prediction Library
//!
//! Runs stored machine-learning pipelines on either pre-computed descriptor
//! vectors or whitespace-delimited SMILES tables, optionally rendering
//! per-atom contributions on a shared color scale.

pub mod chem;
pub mod config;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod render;
pub mod resolver;
pub mod types;

pub use config::AppConfig;
pub use error::{PredictError, PredictResult};
pub use models::inference::InferenceEngine;
pub use models::{InputValues, PredictionDispatcher};
pub use types::{ModelMetadata, PredictionOutput, ResultTable};
