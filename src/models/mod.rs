//! Model storage, loading and prediction dispatch

pub mod dispatch;
pub mod inference;
pub mod loader;
pub mod native;
pub mod onnx;
pub mod pipeline;
pub mod store;

pub use dispatch::{InputValues, PredictionDispatcher};
pub use inference::InferenceEngine;
pub use loader::{ArtifactFormat, LoadedModel, ModelLoader};
pub use pipeline::{AtomContributions, InferencePipeline, PipelineInput};
pub use store::{ArtifactStore, StoredModel};
