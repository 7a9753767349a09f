//! Show the forecast currently published to the remote slot

use anyhow::{Context, Result};
use weather_lib::{ForecastStore, HttpStore, PipelineConfig};

use crate::output::{print_forecast, print_warning, OutputFormat};

pub async fn show_forecast(config: &PipelineConfig, format: OutputFormat) -> Result<()> {
    let store = HttpStore::new(&config.store()).context("Failed to create forecast store client")?;
    match store.latest().await.context("Failed to fetch the published forecast")? {
        Some(record) => print_forecast(&record, format),
        None => {
            print_warning("No forecast has been published yet");
            Ok(())
        }
    }
}
