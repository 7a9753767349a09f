//! Pipeline configuration
//!
//! Values are layered: serde defaults, then an optional
//! `weather-pipeline.toml`, then `WEATHER_*` environment variables.
//! Each stage receives its own config value derived from [`PipelineConfig`]
//! so stages can be driven with injected settings in tests.

use crate::error::{PipelineError, Result};
use crate::features::FeatureSchema;
use crate::ingest::IngestConfig;
use crate::labeler::LabelerConfig;
use crate::observability::LogFormat;
use crate::predictor::PredictorConfig;
use crate::store::StoreConfig;
use crate::trainer::TrainerConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "weather-pipeline";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "WEATHER";

/// Full pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Remote log collection endpoint (GET)
    #[serde(default = "default_log_url")]
    pub log_url: String,

    /// Remote forecast slot endpoint (PUT)
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,

    #[serde(default = "default_raw_table_path")]
    pub raw_table_path: PathBuf,

    #[serde(default = "default_labeled_table_path")]
    pub labeled_table_path: PathBuf,

    #[serde(default = "default_regressor_path")]
    pub regressor_path: PathBuf,

    #[serde(default = "default_classifier_path")]
    pub classifier_path: PathBuf,

    /// Numeric channel used to order readings in time
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,

    /// Label horizon in rows, not wall-clock time
    #[serde(default = "default_step_ahead")]
    pub step_ahead: usize,

    /// Below this many usable labeled rows training is refused
    #[serde(default = "default_min_training_rows")]
    pub min_training_rows: usize,

    /// Below this many usable labeled rows training warns about model quality
    #[serde(default = "default_small_dataset_rows")]
    pub small_dataset_rows: usize,

    /// At or above this many rows a held-out evaluation split is made
    #[serde(default = "default_split_min_rows")]
    pub split_min_rows: usize,

    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,

    #[serde(default = "default_n_trees")]
    pub n_trees: usize,

    #[serde(default = "default_random_seed")]
    pub random_seed: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Prometheus textfile written at the end of a run when set
    #[serde(default)]
    pub metrics_textfile: Option<PathBuf>,
}

fn default_log_url() -> String {
    "https://weather-station-default-rtdb.firebaseio.com/WeatherLogs.json".to_string()
}

fn default_forecast_url() -> String {
    "https://weather-station-default-rtdb.firebaseio.com/WeatherForecast.json".to_string()
}

fn default_raw_table_path() -> PathBuf {
    PathBuf::from("weather_logs_raw.csv")
}

fn default_labeled_table_path() -> PathBuf {
    PathBuf::from("weather_dataset.csv")
}

fn default_regressor_path() -> PathBuf {
    PathBuf::from("real_temp_next_model.json")
}

fn default_classifier_path() -> PathBuf {
    PathBuf::from("real_rain_next_model.json")
}

fn default_timestamp_column() -> String {
    "timestamp_ms".to_string()
}

fn default_step_ahead() -> usize {
    1
}

fn default_min_training_rows() -> usize {
    3
}

fn default_small_dataset_rows() -> usize {
    10
}

fn default_split_min_rows() -> usize {
    20
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_n_trees() -> usize {
    100
}

fn default_random_seed() -> u64 {
    42
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            log_url: default_log_url(),
            forecast_url: default_forecast_url(),
            raw_table_path: default_raw_table_path(),
            labeled_table_path: default_labeled_table_path(),
            regressor_path: default_regressor_path(),
            classifier_path: default_classifier_path(),
            timestamp_column: default_timestamp_column(),
            step_ahead: default_step_ahead(),
            min_training_rows: default_min_training_rows(),
            small_dataset_rows: default_small_dataset_rows(),
            split_min_rows: default_split_min_rows(),
            test_fraction: default_test_fraction(),
            n_trees: default_n_trees(),
            random_seed: default_random_seed(),
            request_timeout_secs: default_request_timeout_secs(),
            log_format: LogFormat::default(),
            metrics_textfile: None,
        }
    }
}

impl PipelineConfig {
    /// Load from the environment and a configuration file
    ///
    /// An explicit `file` must exist. Without one, `weather-pipeline.toml` in
    /// the working directory is read when present.
    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let file_source = match file {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: PipelineConfig = config::Config::builder()
            .add_source(file_source)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values no stage can run with
    pub fn validate(&self) -> Result<()> {
        if self.step_ahead == 0 {
            return Err(PipelineError::Config(
                "step_ahead must be at least 1".to_string(),
            ));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(PipelineError::Config(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.n_trees == 0 {
            return Err(PipelineError::Config("n_trees must be at least 1".to_string()));
        }
        if self.min_training_rows == 0 {
            return Err(PipelineError::Config(
                "min_training_rows must be at least 1".to_string(),
            ));
        }
        if self.timestamp_column.is_empty() {
            return Err(PipelineError::Config(
                "timestamp_column must not be empty".to_string(),
            ));
        }
        for (name, value) in [("log_url", &self.log_url), ("forecast_url", &self.forecast_url)] {
            url::Url::parse(value)
                .map_err(|e| PipelineError::Config(format!("{name} is not a valid URL: {e}")))?;
        }
        Ok(())
    }

    pub fn store(&self) -> StoreConfig {
        StoreConfig {
            log_url: self.log_url.clone(),
            forecast_url: self.forecast_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn ingest(&self) -> IngestConfig {
        IngestConfig {
            raw_table_path: self.raw_table_path.clone(),
            timestamp_column: self.timestamp_column.clone(),
        }
    }

    pub fn labeler(&self) -> LabelerConfig {
        LabelerConfig {
            raw_table_path: self.raw_table_path.clone(),
            labeled_table_path: self.labeled_table_path.clone(),
            timestamp_column: self.timestamp_column.clone(),
            step_ahead: self.step_ahead,
        }
    }

    pub fn trainer(&self) -> TrainerConfig {
        TrainerConfig {
            labeled_table_path: self.labeled_table_path.clone(),
            regressor_path: self.regressor_path.clone(),
            classifier_path: self.classifier_path.clone(),
            schema: FeatureSchema::standard(),
            min_training_rows: self.min_training_rows,
            small_dataset_rows: self.small_dataset_rows,
            split_min_rows: self.split_min_rows,
            test_fraction: self.test_fraction,
            n_trees: self.n_trees,
            random_seed: self.random_seed,
        }
    }

    pub fn predictor(&self) -> PredictorConfig {
        PredictorConfig {
            raw_table_path: self.raw_table_path.clone(),
            regressor_path: self.regressor_path.clone(),
            classifier_path: self.classifier_path.clone(),
            timestamp_column: self.timestamp_column.clone(),
            schema: FeatureSchema::standard(),
        }
    }
}
