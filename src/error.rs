//! Error types for prediction dispatch

use thiserror::Error;

/// Errors surfaced by the prediction dispatcher.
///
/// Invalid SMILES lines are not errors: they are dropped and counted in the
/// result table's batch statistics.
#[derive(Error, Debug)]
pub enum PredictError {
    /// SMILES-input model called without the `SMILES` text
    #[error("input value '{0}' is required for SMILES models")]
    MissingSmiles(String),

    /// Descriptor value that is not a number
    #[error("descriptor '{name}' has non-numeric value '{value}'")]
    InvalidDescriptor { name: String, value: String },

    /// Pipeline returned the wrong number of predictions
    #[error("pipeline returned {actual} predictions for {expected} records")]
    PredictionCount { expected: usize, actual: usize },

    /// Column added to a table with a different row count
    #[error("column '{column}' has {actual} values for {expected} rows")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// Metadata lacks the output description
    #[error("model metadata has no outports entry")]
    MissingOutport,

    /// Pipeline cannot consume the given input shape
    #[error("pipeline does not accept {0} input")]
    UnsupportedInput(&'static str),

    /// Failure inside the inference pipeline
    #[error(transparent)]
    Pipeline(#[from] anyhow::Error),
}

/// Result alias for dispatch operations
pub type PredictResult<T> = std::result::Result<T, PredictError>;
