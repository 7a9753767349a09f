//! Stage runners for the weather forecast pipeline
//!
//! Each runner wraps one library stage with the structured events and
//! metrics every entry point reports. The four stage binaries and the
//! `wxp` operator CLI both go through these.

pub mod stages;

use anyhow::{Context, Result};
use std::path::Path;
use weather_lib::{init_tracing, PipelineConfig, PipelineMetrics};

pub const PIPELINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Load configuration and install the tracing subscriber it asks for
pub fn bootstrap(config_file: Option<&Path>) -> Result<PipelineConfig> {
    let config = PipelineConfig::load_from(config_file).context("Failed to load pipeline configuration")?;
    init_tracing(config.log_format);
    Ok(config)
}

/// Write run metrics to the textfile collector path, if one is configured
pub fn export_metrics(config: &PipelineConfig, metrics: &PipelineMetrics) -> Result<()> {
    if let Some(path) = &config.metrics_textfile {
        metrics
            .write_textfile(path)
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }
    Ok(())
}
