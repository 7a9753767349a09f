//! Forecast from the latest reading and publish it to the forecast slot

use anyhow::{Context, Result};
use weather_lib::{HttpStore, PipelineMetrics};
use weather_pipeline::{bootstrap, export_metrics, stages};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = bootstrap(None)?;
    let metrics = PipelineMetrics::new()?;
    let store = HttpStore::new(&config.store()).context("Failed to create forecast store client")?;

    stages::predict_and_push(&config, Some(&store), &metrics)
        .await
        .context("Forecast publication failed")?;

    export_metrics(&config, &metrics)
}
