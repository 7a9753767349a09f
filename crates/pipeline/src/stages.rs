//! One runner per pipeline stage

use weather_lib::ingest::{self, IngestOutcome};
use weather_lib::observability::stages;
use weather_lib::{
    labeler, predictor, trainer, ForecastRecord, ForecastStore, LabelSummary, LogStore, PipelineConfig,
    PipelineMetrics, Result, StageLogger, TrainingReport,
};

/// Log a stage failure before handing the error back
fn observe<T>(logger: &StageLogger, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        logger.log_failed(err);
    }
    result
}

/// Fetch the remote log and overwrite the raw table
pub async fn download_logs(
    config: &PipelineConfig,
    store: &dyn LogStore,
    metrics: &PipelineMetrics,
) -> Result<IngestOutcome> {
    let logger = StageLogger::new(stages::INGEST);
    logger.log_started(crate::PIPELINE_VERSION);

    let outcome = observe(&logger, ingest::ingest(store, &config.ingest()).await)?;
    match outcome {
        IngestOutcome::NoData => logger.log_no_data(),
        IngestOutcome::Written { rows, sorted } => {
            logger.log_ingested(rows, sorted, &config.raw_table_path);
            metrics.set_rows_ingested(rows);
        }
    }
    metrics.mark_success(stages::INGEST);
    Ok(outcome)
}

/// Relabel the raw table into the supervised dataset
pub fn prepare_dataset(config: &PipelineConfig, metrics: &PipelineMetrics) -> Result<LabelSummary> {
    let logger = StageLogger::new(stages::LABEL);
    logger.log_started(crate::PIPELINE_VERSION);

    let summary = observe(&logger, labeler::run(&config.labeler()))?;
    logger.log_labeled(
        summary.input_rows,
        summary.labeled_rows,
        config.step_ahead,
        &config.labeled_table_path,
    );
    metrics.set_rows_labeled(summary.labeled_rows);
    metrics.mark_success(stages::LABEL);
    Ok(summary)
}

/// Fit and persist both models
pub fn train_models(config: &PipelineConfig, metrics: &PipelineMetrics) -> Result<TrainingReport> {
    let logger = StageLogger::new(stages::TRAIN);
    logger.log_started(crate::PIPELINE_VERSION);

    let report = observe(&logger, trainer::run(&config.trainer()))?;
    if let Some(evaluation) = report.evaluation {
        logger.log_evaluation(evaluation.r2, evaluation.accuracy, report.test_rows);
        metrics.set_evaluation(evaluation.r2, evaluation.accuracy);
    }
    logger.log_trained(report.train_rows, &report.rain_classes);
    metrics.set_training_rows(report.train_rows);
    metrics.mark_success(stages::TRAIN);
    Ok(report)
}

/// Forecast from the latest reading; publish unless `store` is None
pub async fn predict_and_push(
    config: &PipelineConfig,
    store: Option<&dyn ForecastStore>,
    metrics: &PipelineMetrics,
) -> Result<ForecastRecord> {
    let logger = StageLogger::new(stages::PREDICT);
    logger.log_started(crate::PIPELINE_VERSION);

    let predictor_config = config.predictor();
    let record = match store {
        Some(store) => observe(&logger, predictor::run(&predictor_config, store).await)?,
        None => observe(&logger, predictor::forecast(&predictor_config))?,
    };

    logger.log_forecast(
        record.temp_pred_next,
        record.rain_prob_next,
        record.source_timestamp_ms,
    );
    metrics.set_forecast(record.temp_pred_next, record.rain_prob_next);
    if store.is_some() {
        metrics.mark_success(stages::PREDICT);
    }
    Ok(record)
}
