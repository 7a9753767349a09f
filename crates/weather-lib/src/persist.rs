//! Model artifact persistence
//!
//! This module provides:
//! - Atomic replace of artifact files (temp file, fsync, rename)
//! - Paired saves that stage every file before renaming any of them
//! - Checksummed model envelopes recording the feature schema
//! - Validation on load so a corrupt or foreign file never reaches inference

use crate::error::{PipelineError, Result};
use crate::features::FeatureSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Envelope layout version
pub const FORMAT_VERSION: u32 = 1;

/// Which target a persisted model predicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    TemperatureRegressor,
    RainClassifier,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::TemperatureRegressor => write!(f, "temperature_regressor"),
            ModelKind::RainClassifier => write!(f, "rain_classifier"),
        }
    }
}

/// A fitted model with the metadata needed to trust it at load time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact<M> {
    pub kind: ModelKind,
    pub format_version: u32,
    pub features: FeatureSchema,
    pub trained_at: i64,
    pub trained_rows: usize,
    /// SHA-256 of the serialized `model`
    pub checksum: String,
    pub model: M,
}

impl<M: Serialize> ModelArtifact<M> {
    pub fn new(kind: ModelKind, features: FeatureSchema, trained_rows: usize, model: M) -> Result<Self> {
        let checksum = model_checksum(&model)?;
        Ok(Self {
            kind,
            format_version: FORMAT_VERSION,
            features,
            trained_at: chrono::Utc::now().timestamp(),
            trained_rows,
            checksum,
            model,
        })
    }
}

/// Persist an artifact, replacing any previous version
pub fn save_model<M: Serialize>(path: &Path, artifact: &ModelArtifact<M>) -> Result<()> {
    let bytes = encode(artifact)?;
    write_atomic(path, &bytes)?;
    log_saved(path, artifact, bytes.len());
    Ok(())
}

/// Persist two artifacts so that either both are replaced or neither is
///
/// Both files are fully written and synced next to their targets before
/// the first rename. A failure while staging removes what was staged and
/// leaves the previous artifacts in place.
pub fn save_model_pair<A: Serialize, B: Serialize>(
    first: (&Path, &ModelArtifact<A>),
    second: (&Path, &ModelArtifact<B>),
) -> Result<()> {
    let first_bytes = encode(first.1)?;
    let second_bytes = encode(second.1)?;
    write_all_atomic(&[(first.0, &first_bytes), (second.0, &second_bytes)])?;

    log_saved(first.0, first.1, first_bytes.len());
    log_saved(second.0, second.1, second_bytes.len());
    Ok(())
}

fn encode<M: Serialize>(artifact: &ModelArtifact<M>) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(artifact)
        .map_err(|e| PipelineError::Training(format!("failed to serialize {}: {e}", artifact.kind)))
}

fn log_saved<M>(path: &Path, artifact: &ModelArtifact<M>, size: usize) {
    info!(
        kind = %artifact.kind,
        path = %path.display(),
        checksum = %artifact.checksum,
        size,
        "Model saved"
    );
}

/// Load and validate an artifact of the expected kind
pub fn load_model<M>(path: &Path, expected: ModelKind) -> Result<ModelArtifact<M>>
where
    M: Serialize + DeserializeOwned,
{
    if !path.exists() {
        return Err(PipelineError::model_load(
            path,
            "model file not found, run the training stage first",
        ));
    }

    let bytes = fs::read(path).map_err(|e| PipelineError::model_load(path, e))?;
    let artifact: ModelArtifact<M> =
        serde_json::from_slice(&bytes).map_err(|e| PipelineError::model_load(path, e))?;

    if artifact.kind != expected {
        return Err(PipelineError::model_load(
            path,
            format!("expected a {expected} model, found {}", artifact.kind),
        ));
    }
    if artifact.format_version != FORMAT_VERSION {
        return Err(PipelineError::model_load(
            path,
            format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                artifact.format_version
            ),
        ));
    }

    let computed = model_checksum(&artifact.model).map_err(|e| PipelineError::model_load(path, e))?;
    if computed != artifact.checksum {
        return Err(PipelineError::model_load(
            path,
            format!(
                "checksum mismatch: expected {}, got {computed}",
                artifact.checksum
            ),
        ));
    }

    debug!(kind = %artifact.kind, path = %path.display(), "Model loaded");
    Ok(artifact)
}

/// Write to a temp sibling, sync, then rename over `path`
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    write_all_atomic(&[(path, bytes)])
}

/// Stage every file as a synced temp sibling, then rename them in order
fn write_all_atomic(files: &[(&Path, &[u8])]) -> Result<()> {
    let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(files.len());
    for (path, bytes) in files {
        match stage(path, bytes) {
            Ok(temp_path) => staged.push((temp_path, *path)),
            Err(e) => {
                for (temp_path, _) in &staged {
                    let _ = fs::remove_file(temp_path);
                }
                return Err(e);
            }
        }
    }

    for (temp_path, path) in &staged {
        fs::rename(temp_path, path)?;
    }
    Ok(())
}

fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let written = File::create(&temp_path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(temp_path)
}

fn model_checksum<M: Serialize>(model: &M) -> Result<String> {
    let bytes = serde_json::to_vec(model)
        .map_err(|e| PipelineError::Training(format!("failed to serialize model: {e}")))?;
    Ok(compute_checksum(&bytes))
}

/// Compute SHA256 checksum of data
fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
