//! Weather station forecasting library
//!
//! This crate provides the core functionality for:
//! - Ingesting the remote sensor log into a local raw table
//! - Labeling readings with the values observed a fixed number of steps later
//! - Training a temperature regressor and a rain classifier
//! - Predicting from the latest reading and publishing the forecast
//!
//! Stages talk to each other only through files on disk, so each one can be
//! run on its own schedule.

pub mod config;
pub mod error;
pub mod features;
pub mod ingest;
pub mod labeler;
pub mod ml;
pub mod models;
pub mod observability;
pub mod persist;
pub mod predictor;
pub mod store;
pub mod table;
pub mod trainer;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use features::{FeatureSchema, FEATURE_CHANNELS};
pub use ingest::{IngestConfig, IngestOutcome};
pub use labeler::{LabelSummary, LabelerConfig};
pub use models::*;
pub use observability::{init_tracing, LogFormat, PipelineMetrics, StageLogger};
pub use predictor::PredictorConfig;
pub use store::{ForecastStore, HttpStore, LogStore, MemoryStore, StoreConfig};
pub use trainer::{Evaluation, TrainerConfig, TrainingReport};
