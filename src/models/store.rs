//! Filesystem store for pipeline artifacts and their metadata.
//!
//! Layout under the store root:
//!
//! ```text
//! artifacts/<id>.<revision>.<ext>   pipeline artifact
//! records/<id>.json                 StoredModel record
//! ```
//!
//! Every save writes a fresh artifact file. The record is the commit point:
//! the previous artifact is removed only after the new record is in place,
//! and a new artifact whose record never lands is removed again.

use super::loader::ArtifactFormat;
use crate::types::ModelMetadata;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Record of one stored model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredModel {
    pub id: Uuid,
    pub name: String,
    /// Artifact file name under `artifacts/`
    pub file_name: String,
    pub format: ArtifactFormat,
    pub metadata: ModelMetadata,
    pub updated_at: DateTime<Utc>,
}

/// Removes a written artifact unless the save committed
struct UncommittedFile {
    path: PathBuf,
    committed: bool,
}

impl UncommittedFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for UncommittedFile {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "Failed to remove uncommitted artifact");
            } else {
                debug!(path = %self.path.display(), "Removed uncommitted artifact");
            }
        }
    }
}

pub struct ArtifactStore {
    root: PathBuf,
    /// Makes every record commit fail
    #[cfg(test)]
    refuse_commits: AtomicBool,
}

impl ArtifactStore {
    /// Open a store, creating its directories when missing
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        for dir in [root.join("artifacts"), root.join("records")] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create store directory {}", dir.display()))?;
        }
        Ok(Self {
            root,
            #[cfg(test)]
            refuse_commits: AtomicBool::new(false),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.root.join("records").join(format!("{id}.json"))
    }

    pub fn artifact_path(&self, model: &StoredModel) -> PathBuf {
        self.artifacts_dir().join(&model.file_name)
    }

    /// Record of `id`, if one exists
    pub fn find(&self, id: Uuid) -> Result<Option<StoredModel>> {
        let path = self.record_path(id);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes =
            fs::read(&path).with_context(|| format!("Failed to read record {}", path.display()))?;
        let model = serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt record {}", path.display()))?;
        Ok(Some(model))
    }

    pub fn get(&self, id: Uuid) -> Result<StoredModel> {
        self.find(id)?.ok_or_else(|| anyhow!("No model with id {}", id))
    }

    /// All records, oldest first
    pub fn list(&self) -> Result<Vec<StoredModel>> {
        let dir = self.root.join("records");
        let mut models = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("Failed to list {}", dir.display()))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path)?;
            match serde_json::from_slice::<StoredModel>(&bytes) {
                Ok(model) => models.push(model),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping corrupt record"),
            }
        }
        models.sort_by_key(|m| m.updated_at);
        Ok(models)
    }

    /// Raw artifact bytes of a stored model
    pub fn read_artifact(&self, model: &StoredModel) -> Result<Vec<u8>> {
        let path = self.artifact_path(model);
        fs::read(&path).with_context(|| format!("Failed to read artifact {}", path.display()))
    }

    /// Store an artifact under `id`, replacing any previous one
    pub fn save(
        &self,
        id: Uuid,
        name: &str,
        format: ArtifactFormat,
        artifact: &[u8],
        metadata: ModelMetadata,
    ) -> Result<StoredModel> {
        let previous = self.find(id)?;

        let file_name = format!("{}.{}.{}", id, Uuid::new_v4().simple(), format.extension());
        let path = self.artifacts_dir().join(&file_name);

        let mut tmp = NamedTempFile::new_in(self.artifacts_dir())?;
        tmp.write_all(artifact)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)
            .with_context(|| format!("Failed to write artifact {}", path.display()))?;
        let pending = UncommittedFile::new(path);

        let model = StoredModel {
            id,
            name: name.to_string(),
            file_name,
            format,
            metadata,
            updated_at: Utc::now(),
        };
        self.write_record(&model)?;
        pending.commit();

        if let Some(previous) = previous {
            if previous.file_name != model.file_name {
                let old = self.artifact_path(&previous);
                if let Err(e) = fs::remove_file(&old) {
                    warn!(path = %old.display(), error = %e, "Failed to remove replaced artifact");
                }
            }
        }

        info!(id = %id, name = %name, format = ?format, size = artifact.len(), "Model stored");
        Ok(model)
    }

    fn write_record(&self, model: &StoredModel) -> Result<()> {
        let path = self.record_path(model.id);
        #[cfg(test)]
        {
            if self.refuse_commits.load(Ordering::Relaxed) {
                return Err(anyhow!("Failed to write record {}: commits refused", path.display()));
            }
        }
        let json = serde_json::to_vec_pretty(model)?;
        let dir = self.root.join("records");
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path)
            .with_context(|| format!("Failed to write record {}", path.display()))?;
        Ok(())
    }

    /// Remove a model. The record goes first so a half-finished delete never
    /// leaves a record pointing at a missing artifact.
    pub fn delete(&self, id: Uuid) -> Result<StoredModel> {
        let model = self.get(id)?;
        let record = self.record_path(id);
        fs::remove_file(&record)
            .with_context(|| format!("Failed to remove record {}", record.display()))?;

        let artifact = self.artifact_path(&model);
        if let Err(e) = fs::remove_file(&artifact) {
            warn!(path = %artifact.display(), error = %e, "Failed to remove artifact");
        }
        info!(id = %id, name = %model.name, "Model removed");
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InputType;
    use tempfile::TempDir;

    fn artifact_files(store: &ArtifactStore) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(store.artifacts_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn smiles_metadata() -> ModelMetadata {
        ModelMetadata {
            input_type: InputType::Smiles,
            input_spec: Some(vec!["SMILES".to_string()]),
            outports: Vec::new(),
        }
    }

    #[test]
    fn test_save_and_get() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let id = Uuid::new_v4();

        let saved = store
            .save(id, "logS", ArtifactFormat::Native, b"{}", smiles_metadata())
            .unwrap();
        assert_eq!(store.get(id).unwrap(), saved);
        assert_eq!(store.read_artifact(&saved).unwrap(), b"{}");
        assert!(saved.file_name.ends_with(".json"));
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_replace_removes_previous_artifact() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let id = Uuid::new_v4();

        let first = store
            .save(id, "logS", ArtifactFormat::Native, b"{\"v\": 1}", ModelMetadata::default())
            .unwrap();
        let second = store
            .save(id, "logS", ArtifactFormat::Onnx, b"onnx", ModelMetadata::default())
            .unwrap();

        assert_ne!(first.file_name, second.file_name);
        assert_eq!(artifact_files(&store), vec![second.file_name.clone()]);
        assert_eq!(store.get(id).unwrap().format, ArtifactFormat::Onnx);
    }

    #[test]
    fn test_failed_commit_removes_new_artifact() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let id = Uuid::new_v4();

        // a directory in place of the record makes the commit fail
        fs::create_dir_all(store.record_path(id)).unwrap();

        let result = store.save(id, "logS", ArtifactFormat::Native, b"{}", ModelMetadata::default());
        assert!(result.is_err());
        assert!(artifact_files(&store).is_empty());
    }

    #[test]
    fn test_failed_commit_keeps_previous_model() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let id = Uuid::new_v4();
        let first = store
            .save(id, "logS", ArtifactFormat::Native, b"{\"v\": 1}", smiles_metadata())
            .unwrap();

        store.refuse_commits.store(true, Ordering::Relaxed);
        let result = store.save(id, "logS v2", ArtifactFormat::Onnx, b"onnx", ModelMetadata::default());
        assert!(result.is_err());

        assert_eq!(store.get(id).unwrap(), first);
        assert_eq!(artifact_files(&store), vec![first.file_name.clone()]);
        assert_eq!(store.read_artifact(&first).unwrap(), b"{\"v\": 1}");
    }

    #[test]
    fn test_delete_removes_record_and_artifact() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let id = Uuid::new_v4();
        store
            .save(id, "logS", ArtifactFormat::Native, b"{}", ModelMetadata::default())
            .unwrap();

        let removed = store.delete(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(store.find(id).unwrap().is_none());
        assert!(artifact_files(&store).is_empty());
        assert!(store.delete(id).is_err());
    }
}
