//! Error taxonomy shared by every pipeline stage

use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a pipeline stage
///
/// No variant is retried. An operator fixes the underlying condition and
/// re-runs the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The remote log store could not be read
    #[error("failed to fetch weather logs from {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The remote forecast store rejected or never received the write
    #[error("failed to publish forecast to {url}: {reason}")]
    Publish { url: String, reason: String },

    /// An artifact the stage depends on is absent or unusable
    #[error("missing input {}: {reason}", path.display())]
    MissingInput { path: PathBuf, reason: String },

    /// The labeled table is too small to fit models on
    #[error(
        "not enough data to train: {rows} usable labeled rows, at least {required} required. \
         Collect more logs and run the labeling stage (prepare-dataset) again"
    )]
    InsufficientData { rows: usize, required: usize },

    /// A persisted model is missing, corrupt, or incompatible
    #[error("failed to load model {}: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },

    /// A table artifact exists but cannot be parsed
    #[error("malformed table {}: {reason}", path.display())]
    Table { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("model training failed: {0}")]
    Training(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub(crate) fn missing_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MissingInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn model_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn table(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Table {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
