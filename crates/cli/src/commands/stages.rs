//! Stage commands: run one pipeline stage or the whole chain

use anyhow::{Context, Result};
use serde::Serialize;
use tabled::Tabled;
use weather_lib::ingest::IngestOutcome;
use weather_lib::{HttpStore, PipelineConfig, PipelineMetrics};
use weather_pipeline::stages;

use crate::output::{
    format_probability, format_temperature, print_forecast, print_success, print_table, print_warning,
    OutputFormat,
};

/// Row for the stage summary table
#[derive(Tabled, Serialize)]
pub struct StageRow {
    #[tabled(rename = "Stage")]
    stage: &'static str,
    #[tabled(rename = "Result")]
    result: String,
}

/// Fetch the remote log into the raw table; returns false when it was empty
pub async fn ingest(config: &PipelineConfig, metrics: &PipelineMetrics) -> Result<(StageRow, bool)> {
    let store = HttpStore::new(&config.store()).context("Failed to create log store client")?;
    let outcome = stages::download_logs(config, &store, metrics)
        .await
        .context("Log ingestion failed")?;

    let (result, proceed) = match outcome {
        IngestOutcome::NoData => ("remote log is empty, nothing written".to_string(), false),
        IngestOutcome::Written { rows, sorted } => (
            format!(
                "{rows} readings -> {}{}",
                config.raw_table_path.display(),
                if sorted { "" } else { " (unsorted)" }
            ),
            true,
        ),
    };
    Ok((StageRow { stage: "ingest", result }, proceed))
}

pub fn label(config: &PipelineConfig, metrics: &PipelineMetrics) -> Result<StageRow> {
    let summary = stages::prepare_dataset(config, metrics).context("Dataset preparation failed")?;
    Ok(StageRow {
        stage: "label",
        result: format!(
            "{} of {} readings labeled (step {}) -> {}",
            summary.labeled_rows,
            summary.input_rows,
            config.step_ahead,
            config.labeled_table_path.display()
        ),
    })
}

pub fn train(config: &PipelineConfig, metrics: &PipelineMetrics) -> Result<StageRow> {
    let report = stages::train_models(config, metrics).context("Model training failed")?;
    let evaluation = match report.evaluation {
        Some(e) => format!(
            ", held-out R² {:.3}, accuracy {:.0}% on {} rows",
            e.r2,
            e.accuracy * 100.0,
            report.test_rows
        ),
        None => ", no held-out evaluation".to_string(),
    };
    let mut result = format!("fitted on {} rows{}", report.train_rows, evaluation);
    if report.small_dataset {
        result.push_str(" (small dataset)");
    }
    Ok(StageRow {
        stage: "train",
        result,
    })
}

/// Forecast from the latest reading, publishing unless `dry_run`
pub async fn predict(
    config: &PipelineConfig,
    metrics: &PipelineMetrics,
    dry_run: bool,
) -> Result<(StageRow, weather_lib::ForecastRecord)> {
    let record = if dry_run {
        stages::predict_and_push(config, None, metrics).await
    } else {
        let store = HttpStore::new(&config.store()).context("Failed to create forecast store client")?;
        stages::predict_and_push(config, Some(&store), metrics).await
    }
    .context("Prediction failed")?;

    let result = format!(
        "{}, rain {}{}",
        format_temperature(record.temp_pred_next),
        format_probability(record.rain_prob_next),
        if dry_run { " (not published)" } else { " published" }
    );
    Ok((StageRow { stage: "predict", result }, record))
}

pub async fn run_ingest(config: &PipelineConfig, format: OutputFormat) -> Result<()> {
    let metrics = PipelineMetrics::new()?;
    let (row, proceed) = ingest(config, &metrics).await?;
    finish(config, &metrics, vec![row], format)?;
    if !proceed && matches!(format, OutputFormat::Table) {
        print_warning("No readings in the remote log yet");
    }
    Ok(())
}

pub fn run_label(config: &PipelineConfig, format: OutputFormat) -> Result<()> {
    let metrics = PipelineMetrics::new()?;
    let row = label(config, &metrics)?;
    finish(config, &metrics, vec![row], format)
}

pub fn run_train(config: &PipelineConfig, format: OutputFormat) -> Result<()> {
    let metrics = PipelineMetrics::new()?;
    let row = train(config, &metrics)?;
    finish(config, &metrics, vec![row], format)
}

pub async fn run_predict(config: &PipelineConfig, dry_run: bool, format: OutputFormat) -> Result<()> {
    let metrics = PipelineMetrics::new()?;
    let (_, record) = predict(config, &metrics, dry_run).await?;
    weather_pipeline::export_metrics(config, &metrics)?;
    print_forecast(&record, format)?;
    if matches!(format, OutputFormat::Table) {
        if dry_run {
            print_warning("Dry run: forecast was not published");
        } else {
            print_success("Forecast published");
        }
    }
    Ok(())
}

/// Ingest, label, train and predict in order, stopping at the first failure
///
/// An empty remote log ends the chain early without an error.
pub async fn run_all(config: &PipelineConfig, dry_run: bool, format: OutputFormat) -> Result<()> {
    let metrics = PipelineMetrics::new()?;
    let mut rows = Vec::with_capacity(4);

    let (row, proceed) = ingest(config, &metrics).await?;
    rows.push(row);
    if proceed {
        rows.push(label(config, &metrics)?);
        rows.push(train(config, &metrics)?);
        rows.push(predict(config, &metrics, dry_run).await?.0);
    }

    finish(config, &metrics, rows, format)?;
    if !proceed && matches!(format, OutputFormat::Table) {
        print_warning("No readings in the remote log yet, later stages skipped");
    }
    Ok(())
}

fn finish(
    config: &PipelineConfig,
    metrics: &PipelineMetrics,
    rows: Vec<StageRow>,
    format: OutputFormat,
) -> Result<()> {
    weather_pipeline::export_metrics(config, metrics)?;
    print_table(&rows, format);
    Ok(())
}
