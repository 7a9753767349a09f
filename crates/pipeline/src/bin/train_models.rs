//! Fit the temperature regressor and rain classifier on the labeled table

use anyhow::{Context, Result};
use weather_lib::PipelineMetrics;
use weather_pipeline::{bootstrap, export_metrics, stages};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = bootstrap(None)?;
    let metrics = PipelineMetrics::new()?;

    stages::train_models(&config, &metrics).context("Model training failed")?;

    export_metrics(&config, &metrics)
}
