//! Label the raw table with next-step targets

use anyhow::{Context, Result};
use weather_lib::PipelineMetrics;
use weather_pipeline::{bootstrap, export_metrics, stages};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = bootstrap(None)?;
    let metrics = PipelineMetrics::new()?;

    stages::prepare_dataset(&config, &metrics).context("Dataset preparation failed")?;

    export_metrics(&config, &metrics)
}
