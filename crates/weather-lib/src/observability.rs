//! Observability infrastructure for the pipeline stages
//!
//! Provides:
//! - tracing subscriber setup (JSON or human-readable)
//! - Structured stage events
//! - Prometheus run metrics, optionally exported to a node-exporter textfile

use crate::error::{PipelineError, Result};
use crate::persist::write_atomic;
use prometheus::{Encoder, Gauge, GaugeVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Deserialize;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Install the global subscriber; `RUST_LOG` overrides the `info` default
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(false)).try_init(),
    };
    if let Err(e) = result {
        eprintln!("tracing already initialised: {e}");
    }
}

/// Pipeline stage names used in events and metric labels
pub mod stages {
    pub const INGEST: &str = "ingest";
    pub const LABEL: &str = "label";
    pub const TRAIN: &str = "train";
    pub const PREDICT: &str = "predict";
}

/// Structured logger for stage events
///
/// Keeps the event names and field sets consistent across the binaries.
#[derive(Clone)]
pub struct StageLogger {
    stage: &'static str,
}

impl StageLogger {
    pub fn new(stage: &'static str) -> Self {
        Self { stage }
    }

    pub fn log_started(&self, version: &str) {
        info!(
            event = "stage_started",
            stage = self.stage,
            version = %version,
            "Pipeline stage started"
        );
    }

    pub fn log_no_data(&self) {
        info!(
            event = "no_data",
            stage = self.stage,
            "Remote log collection is empty, nothing to ingest yet"
        );
    }

    pub fn log_ingested(&self, rows: usize, sorted: bool, path: &Path) {
        info!(
            event = "logs_ingested",
            stage = self.stage,
            rows = rows,
            sorted_by_timestamp = sorted,
            path = %path.display(),
            "Raw table written"
        );
    }

    pub fn log_labeled(&self, input_rows: usize, labeled_rows: usize, step_ahead: usize, path: &Path) {
        info!(
            event = "dataset_labeled",
            stage = self.stage,
            input_rows = input_rows,
            labeled_rows = labeled_rows,
            step_ahead = step_ahead,
            path = %path.display(),
            "Labeled table written"
        );
    }

    pub fn log_evaluation(&self, r2: f64, accuracy: f64, test_rows: usize) {
        info!(
            event = "models_evaluated",
            stage = self.stage,
            temperature_r2 = r2,
            rain_accuracy = accuracy,
            test_rows = test_rows,
            "Held-out model performance (rough)"
        );
    }

    pub fn log_trained(&self, train_rows: usize, rain_classes: &[i64]) {
        info!(
            event = "models_trained",
            stage = self.stage,
            train_rows = train_rows,
            rain_classes = ?rain_classes,
            "Models trained and saved"
        );
    }

    pub fn log_forecast(&self, temp_pred: f64, rain_prob: f64, source_timestamp: Option<i64>) {
        info!(
            event = "forecast_generated",
            stage = self.stage,
            temp_pred_next = temp_pred,
            rain_prob_next = rain_prob,
            source_timestamp_ms = ?source_timestamp,
            "Generated next-step forecast"
        );
    }

    pub fn log_failed(&self, err: &PipelineError) {
        error!(
            event = "stage_failed",
            stage = self.stage,
            error = %err,
            "Pipeline stage failed"
        );
    }
}

/// Per-run metrics
///
/// Each instance owns its registry, so tests and multi-stage runs never
/// collide on global registration.
#[derive(Clone)]
pub struct PipelineMetrics {
    registry: Registry,
    rows_ingested: IntGauge,
    rows_labeled: IntGauge,
    training_rows: IntGauge,
    regressor_r2: Gauge,
    classifier_accuracy: Gauge,
    forecast_temperature: Gauge,
    forecast_rain_probability: Gauge,
    last_success: GaugeVec,
}

impl PipelineMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let metrics = Self {
            rows_ingested: IntGauge::new(
                "weather_pipeline_rows_ingested",
                "Readings written to the raw table by the last ingestion",
            )
            .map_err(metrics_error)?,
            rows_labeled: IntGauge::new(
                "weather_pipeline_rows_labeled",
                "Rows written to the labeled table by the last labeling run",
            )
            .map_err(metrics_error)?,
            training_rows: IntGauge::new(
                "weather_pipeline_training_rows",
                "Rows the last models were fitted on",
            )
            .map_err(metrics_error)?,
            regressor_r2: Gauge::new(
                "weather_pipeline_temperature_r2",
                "Held-out R² of the temperature regressor",
            )
            .map_err(metrics_error)?,
            classifier_accuracy: Gauge::new(
                "weather_pipeline_rain_accuracy",
                "Held-out accuracy of the rain classifier",
            )
            .map_err(metrics_error)?,
            forecast_temperature: Gauge::new(
                "weather_pipeline_forecast_temperature_celsius",
                "Last predicted next-step temperature",
            )
            .map_err(metrics_error)?,
            forecast_rain_probability: Gauge::new(
                "weather_pipeline_forecast_rain_probability",
                "Last predicted next-step rain probability",
            )
            .map_err(metrics_error)?,
            last_success: GaugeVec::new(
                Opts::new(
                    "weather_pipeline_last_success_timestamp_seconds",
                    "Unix time of the last successful run per stage",
                ),
                &["stage"],
            )
            .map_err(metrics_error)?,
            registry,
        };

        metrics.register_all()?;
        Ok(metrics)
    }

    fn register_all(&self) -> Result<()> {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(self.rows_ingested.clone()),
            Box::new(self.rows_labeled.clone()),
            Box::new(self.training_rows.clone()),
            Box::new(self.regressor_r2.clone()),
            Box::new(self.classifier_accuracy.clone()),
            Box::new(self.forecast_temperature.clone()),
            Box::new(self.forecast_rain_probability.clone()),
            Box::new(self.last_success.clone()),
        ];
        for collector in collectors {
            self.registry.register(collector).map_err(metrics_error)?;
        }
        Ok(())
    }

    pub fn set_rows_ingested(&self, rows: usize) {
        self.rows_ingested.set(rows as i64);
    }

    pub fn set_rows_labeled(&self, rows: usize) {
        self.rows_labeled.set(rows as i64);
    }

    pub fn set_training_rows(&self, rows: usize) {
        self.training_rows.set(rows as i64);
    }

    pub fn set_evaluation(&self, r2: f64, accuracy: f64) {
        self.regressor_r2.set(r2);
        self.classifier_accuracy.set(accuracy);
    }

    pub fn set_forecast(&self, temperature: f64, rain_probability: f64) {
        self.forecast_temperature.set(temperature);
        self.forecast_rain_probability.set(rain_probability);
    }

    pub fn mark_success(&self, stage: &str) {
        self.last_success
            .with_label_values(&[stage])
            .set(chrono::Utc::now().timestamp() as f64);
    }

    /// Text exposition of every metric
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(metrics_error)
    }

    /// Write the exposition to a textfile-collector path
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.render()?.as_bytes())
    }
}

fn metrics_error(err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Config(format!("metrics: {err}"))
}
