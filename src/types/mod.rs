//! Type definitions for prediction dispatch

pub mod metadata;
pub mod table;
pub mod value;

pub use metadata::{InputType, ModelMetadata, Outport, SMILES_KEY};
pub use table::{BatchStats, PredictionOutput, ResultTable};
pub use value::Value;
