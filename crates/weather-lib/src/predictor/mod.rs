//! Predictor: latest reading to published forecast

mod inference;
mod output;

pub use inference::{ForecastModels, Prediction};
pub use output::build_record;

use crate::error::{PipelineError, Result};
use crate::features::FeatureSchema;
use crate::models::{sort_chronologically, ForecastRecord};
use crate::store::ForecastStore;
use crate::table;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct PredictorConfig {
    pub raw_table_path: PathBuf,
    pub regressor_path: PathBuf,
    pub classifier_path: PathBuf,
    pub timestamp_column: String,
    pub schema: FeatureSchema,
}

/// Build the forecast for the most recent reading without publishing it
pub fn forecast(config: &PredictorConfig) -> Result<ForecastRecord> {
    let mut readings = table::read_raw(&config.raw_table_path)?;
    sort_chronologically(&mut readings, &config.timestamp_column);
    let current = readings.pop().ok_or_else(|| {
        PipelineError::missing_input(&config.raw_table_path, "raw table has no readings")
    })?;

    let models = ForecastModels::load(config)?;
    let prediction = models.predict(&current).ok_or_else(|| {
        PipelineError::missing_input(
            &config.raw_table_path,
            format!(
                "latest reading {} lacks channels {:?}",
                current.id,
                models.schema().missing_channels(&current)
            ),
        )
    })?;

    Ok(build_record(
        &current,
        &prediction,
        &config.timestamp_column,
        chrono::Utc::now().timestamp(),
    ))
}

/// Build the forecast and overwrite the remote forecast slot with it
pub async fn run(config: &PredictorConfig, store: &dyn ForecastStore) -> Result<ForecastRecord> {
    let record = forecast(config)?;
    store.publish(&record).await?;
    Ok(record)
}
