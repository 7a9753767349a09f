//! Download the remote weather log into the raw table
//!
//! Meant to be run from cron. An empty remote collection is not an error.

use anyhow::{Context, Result};
use weather_lib::{HttpStore, PipelineMetrics};
use weather_pipeline::{bootstrap, export_metrics, stages};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = bootstrap(None)?;
    let metrics = PipelineMetrics::new()?;
    let store = HttpStore::new(&config.store()).context("Failed to create log store client")?;

    stages::download_logs(&config, &store, &metrics)
        .await
        .context("Log ingestion failed")?;

    export_metrics(&config, &metrics)
}
