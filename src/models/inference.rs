//! Inference engine: stored models, loaded pipelines and dispatch

use crate::config::AppConfig;
use crate::metrics::DispatchMetrics;
use crate::models::dispatch::{InputValues, PredictionDispatcher};
use crate::models::loader::{ArtifactFormat, LoadedModel, ModelLoader};
use crate::models::store::{ArtifactStore, StoredModel};
use crate::types::{ModelMetadata, PredictionOutput};
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Loaded pipeline together with the artifact file it came from
struct CachedModel {
    file_name: String,
    model: Arc<Mutex<LoadedModel>>,
}

pub struct InferenceEngine {
    store: ArtifactStore,
    loader: ModelLoader,
    dispatcher: PredictionDispatcher,
    /// Loaded pipelines by model id; `None` loads every artifact per call
    cache: Option<RwLock<HashMap<Uuid, CachedModel>>>,
    metrics: Arc<DispatchMetrics>,
}

impl InferenceEngine {
    /// Create a new inference engine from configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        let store = ArtifactStore::open(&config.models.store_dir)?;
        let loader = ModelLoader::with_threads(config.models.onnx_threads);
        let dispatcher = PredictionDispatcher::new(config.rendering.clone());

        info!(
            store = %config.models.store_dir,
            cache_artifacts = config.models.cache_artifacts,
            "Inference engine initialized"
        );

        Ok(Self::with_parts(
            store,
            loader,
            dispatcher,
            config.models.cache_artifacts,
        ))
    }

    pub fn with_parts(
        store: ArtifactStore,
        loader: ModelLoader,
        dispatcher: PredictionDispatcher,
        cache_artifacts: bool,
    ) -> Self {
        Self {
            store,
            loader,
            dispatcher,
            cache: cache_artifacts.then(|| RwLock::new(HashMap::new())),
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    /// Number of pipelines currently held in memory
    pub fn cached_models(&self) -> usize {
        self.cache
            .as_ref()
            .and_then(|c| c.read().ok().map(|c| c.len()))
            .unwrap_or(0)
    }

    /// Validate and store an artifact
    pub fn import(
        &self,
        id: Uuid,
        name: &str,
        format: ArtifactFormat,
        artifact: &[u8],
        metadata: ModelMetadata,
    ) -> Result<StoredModel> {
        // refuse artifacts that cannot be loaded before touching the store
        self.loader
            .load_bytes(artifact, format, name)
            .with_context(|| format!("Artifact for '{}' cannot be loaded", name))?;

        let stored = self.store.save(id, name, format, artifact, metadata)?;
        self.invalidate(id);
        Ok(stored)
    }

    pub fn remove(&self, id: Uuid) -> Result<StoredModel> {
        let removed = self.store.delete(id)?;
        self.invalidate(id);
        Ok(removed)
    }

    fn invalidate(&self, id: Uuid) {
        if let Some(cache) = &self.cache {
            if let Ok(mut cache) = cache.write() {
                if cache.remove(&id).is_some() {
                    debug!(id = %id, "Evicted cached pipeline");
                }
            }
        }
    }

    /// Obtain the pipeline of a stored model, from cache when enabled
    fn model(&self, record: &StoredModel) -> Result<Arc<Mutex<LoadedModel>>> {
        let Some(cache) = &self.cache else {
            return self.load(record);
        };

        {
            let cache = cache
                .read()
                .map_err(|e| anyhow!("Lock error: {}", e))?;
            if let Some(cached) = cache.get(&record.id) {
                if cached.file_name == record.file_name {
                    return Ok(cached.model.clone());
                }
            }
        }

        let model = self.load(record)?;
        let mut cache = cache
            .write()
            .map_err(|e| anyhow!("Lock error: {}", e))?;
        cache.insert(
            record.id,
            CachedModel {
                file_name: record.file_name.clone(),
                model: model.clone(),
            },
        );
        Ok(model)
    }

    fn load(&self, record: &StoredModel) -> Result<Arc<Mutex<LoadedModel>>> {
        let path = self.store.artifact_path(record);
        let model = self.loader.load_file(&path, &record.name)?;
        Ok(Arc::new(Mutex::new(model)))
    }

    /// Run a stored model on the given inputs
    pub fn predict(
        &self,
        id: Uuid,
        inputs: &InputValues,
        color_atoms: bool,
    ) -> Result<PredictionOutput> {
        let start_time = Instant::now();
        let record = self.store.get(id)?;
        let model = self.model(&record)?;
        let mut model = model
            .lock()
            .map_err(|e| anyhow!("Lock error: {}", e))?;

        let result = self.dispatcher.dispatch(
            &mut *model.pipeline,
            &record.metadata,
            inputs,
            color_atoms,
        );
        let processing_time = start_time.elapsed();

        match result {
            Ok(output) => {
                match &output {
                    PredictionOutput::Scalar(value) => {
                        self.metrics.record_descriptors(processing_time);
                        debug!(
                            model = %record.name,
                            output = record.metadata.output_name().unwrap_or("Predicted"),
                            value = value,
                            "Descriptor prediction"
                        );
                    }
                    PredictionOutput::Table(table) => {
                        self.metrics.record_batch(processing_time, table.stats());
                        debug!(
                            model = %record.name,
                            rows = table.len(),
                            dropped = table.stats().dropped,
                            "Batch prediction"
                        );
                    }
                }
                Ok(output)
            }
            Err(e) => {
                self.metrics.record_failure();
                error!(model = %record.name, error = %e, "Prediction failed");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RendererConfig;
    use crate::types::Value;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    const NATIVE: &[u8] = br#"{
        "estimator": "ridge",
        "fragment_radius": 0,
        "intercept": 0.5,
        "descriptor_coefficients": [2.0],
        "fragment_weights": {"C;H3": 1.0, "O;H1": -1.0}
    }"#;

    fn engine(dir: &TempDir, cache: bool) -> InferenceEngine {
        InferenceEngine::with_parts(
            ArtifactStore::open(dir.path()).unwrap(),
            ModelLoader::new(),
            PredictionDispatcher::new(RendererConfig::default()),
            cache,
        )
    }

    fn smiles_metadata() -> ModelMetadata {
        serde_json::from_str(r#"{"input_type": "SMILES", "outports": [{"name": "logS"}]}"#)
            .unwrap()
    }

    #[test]
    fn test_descriptor_prediction() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, false);
        let id = Uuid::new_v4();
        engine
            .import(id, "logP", ArtifactFormat::Native, NATIVE, ModelMetadata::default())
            .unwrap();

        let inputs: InputValues = [("x", "1.5")].into_iter().collect();
        let output = engine.predict(id, &inputs, false).unwrap();
        assert_eq!(output.as_scalar(), Some(3.5));
        assert_eq!(engine.metrics().descriptor_requests.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_smiles_prediction_with_colors() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, true);
        let id = Uuid::new_v4();
        engine
            .import(id, "logS", ArtifactFormat::Native, NATIVE, smiles_metadata())
            .unwrap();

        let output = engine
            .predict(id, &InputValues::smiles("CCO\nbogus"), true)
            .unwrap();
        let table = output.as_table().unwrap();
        assert_eq!(table.columns(), &["SMILES", "Predicted", "ColorAtom"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "Predicted"), Some(&Value::Number(0.5)));
        assert_eq!(table.stats().dropped, 1);
        assert_eq!(engine.cached_models(), 1);
        assert_eq!(engine.metrics().records_dropped.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_reimport_evicts_cache() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, true);
        let id = Uuid::new_v4();
        engine
            .import(id, "logP", ArtifactFormat::Native, NATIVE, ModelMetadata::default())
            .unwrap();
        let inputs: InputValues = [("x", "1")].into_iter().collect();
        assert_eq!(engine.predict(id, &inputs, false).unwrap().as_scalar(), Some(2.5));

        let updated = br#"{"estimator": "ridge", "descriptor_coefficients": [10.0]}"#;
        engine
            .import(id, "logP", ArtifactFormat::Native, updated, ModelMetadata::default())
            .unwrap();
        assert_eq!(engine.cached_models(), 0);
        assert_eq!(engine.predict(id, &inputs, false).unwrap().as_scalar(), Some(10.0));
    }

    #[test]
    fn test_import_rejects_unloadable_artifact() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, false);
        let id = Uuid::new_v4();
        assert!(engine
            .import(id, "broken", ArtifactFormat::Native, b"[]", ModelMetadata::default())
            .is_err());
        assert!(engine.store().find(id).unwrap().is_none());
    }

    #[test]
    fn test_failures_are_counted() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, false);
        let id = Uuid::new_v4();
        engine
            .import(id, "logS", ArtifactFormat::Native, NATIVE, smiles_metadata())
            .unwrap();

        let inputs: InputValues = [("text", "CCO")].into_iter().collect();
        assert!(engine.predict(id, &inputs, false).is_err());
        assert_eq!(engine.metrics().failed_requests.load(Ordering::Relaxed), 1);

        engine.remove(id).unwrap();
        assert!(engine.predict(id, &InputValues::smiles("CCO"), false).is_err());
    }
}
