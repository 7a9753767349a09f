//! Trainer: labeled table to persisted regressor and classifier
//!
//! Both models are fitted on the same feature matrix. With enough rows a
//! seeded hold-out split is evaluated first; the scores are reported but
//! never gate persistence.

use crate::error::{PipelineError, Result};
use crate::features::FeatureSchema;
use crate::ml::{self, ForestParams, LinearRegression, RandomForestClassifier};
use crate::models::LabeledRow;
use crate::persist::{save_model_pair, ModelArtifact, ModelKind};
use crate::table;
use ndarray::{Array1, Array2, Axis};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub labeled_table_path: PathBuf,
    pub regressor_path: PathBuf,
    pub classifier_path: PathBuf,
    pub schema: FeatureSchema,
    pub min_training_rows: usize,
    pub small_dataset_rows: usize,
    pub split_min_rows: usize,
    pub test_fraction: f64,
    pub n_trees: usize,
    pub random_seed: u64,
}

/// Held-out scores
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub r2: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    /// Usable labeled rows
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub skipped_rows: usize,
    /// None when the dataset was too small to hold rows out
    pub evaluation: Option<Evaluation>,
    pub rain_classes: Vec<i64>,
    pub small_dataset: bool,
}

pub struct TrainedModels {
    pub regressor: LinearRegression,
    pub classifier: RandomForestClassifier,
    pub report: TrainingReport,
}

/// Training matrices built from labeled rows, one row per usable reading
struct Dataset {
    x: Array2<f64>,
    temp: Array1<f64>,
    rain: Array1<i64>,
    skipped: usize,
}

impl Dataset {
    fn from_rows(rows: &[LabeledRow], schema: &FeatureSchema) -> Result<Self> {
        let mut features = Vec::with_capacity(rows.len() * schema.len());
        let mut temp = Vec::with_capacity(rows.len());
        let mut rain = Vec::with_capacity(rows.len());
        let mut skipped = 0;

        for row in rows {
            match schema.extract(&row.reading) {
                Some(values) => {
                    features.extend(values);
                    temp.push(row.temp_next);
                    rain.push(row.rain_next.round() as i64);
                }
                None => {
                    warn!(
                        id = %row.reading.id,
                        missing = ?schema.missing_channels(&row.reading),
                        "Skipping labeled row without all feature channels"
                    );
                    skipped += 1;
                }
            }
        }

        let x = Array2::from_shape_vec((temp.len(), schema.len()), features)
            .map_err(|e| PipelineError::Training(format!("failed to build feature matrix: {e}")))?;
        Ok(Dataset {
            x,
            temp: Array1::from(temp),
            rain: Array1::from(rain),
            skipped,
        })
    }

    fn len(&self) -> usize {
        self.x.nrows()
    }

    fn select(&self, indices: &[usize]) -> (Array2<f64>, Array1<f64>, Array1<i64>) {
        (
            self.x.select(Axis(0), indices),
            self.temp.select(Axis(0), indices),
            self.rain.select(Axis(0), indices),
        )
    }
}

/// Fit both models on labeled rows without touching the filesystem
pub fn train(rows: &[LabeledRow], config: &TrainerConfig) -> Result<TrainedModels> {
    let dataset = Dataset::from_rows(rows, &config.schema)?;
    let n = dataset.len();

    if n < config.min_training_rows {
        return Err(PipelineError::InsufficientData {
            rows: n,
            required: config.min_training_rows,
        });
    }
    let small_dataset = n < config.small_dataset_rows;
    if small_dataset {
        warn!(
            event = "small_dataset",
            rows = n,
            threshold = config.small_dataset_rows,
            "Dataset is very small; models may be poor. Let the station log longer"
        );
    }

    let params = ForestParams {
        n_trees: config.n_trees,
        seed: config.random_seed,
    };

    let (regressor, classifier, train_rows, test_rows, evaluation) = if n >= config.split_min_rows {
        let split = ml::train_test_split(n, config.test_fraction, config.random_seed);
        let (x_train, temp_train, rain_train) = dataset.select(&split.train);
        let (x_test, temp_test, rain_test) = dataset.select(&split.test);

        let regressor = LinearRegression::fit(x_train.view(), temp_train.view())?;
        let classifier = RandomForestClassifier::fit(x_train.view(), rain_train.view(), &params)?;
        let evaluation = Evaluation {
            r2: regressor.score(x_test.view(), temp_test.view()),
            accuracy: classifier.score(x_test.view(), rain_test.view()),
        };
        debug!(r2 = evaluation.r2, accuracy = evaluation.accuracy, "Hold-out evaluation");
        (regressor, classifier, split.train.len(), split.test.len(), Some(evaluation))
    } else {
        let regressor = LinearRegression::fit(dataset.x.view(), dataset.temp.view())?;
        let classifier = RandomForestClassifier::fit(dataset.x.view(), dataset.rain.view(), &params)?;
        (regressor, classifier, n, 0, None)
    };

    let report = TrainingReport {
        rows: n,
        train_rows,
        test_rows,
        skipped_rows: dataset.skipped,
        evaluation,
        rain_classes: classifier.classes().to_vec(),
        small_dataset,
    };

    Ok(TrainedModels {
        regressor,
        classifier,
        report,
    })
}

/// Read the labeled table, fit both models, and persist them together
pub fn run(config: &TrainerConfig) -> Result<TrainingReport> {
    let rows = table::read_labeled(&config.labeled_table_path)?;
    let TrainedModels {
        regressor,
        classifier,
        report,
    } = train(&rows, config)?;

    let regressor = ModelArtifact::new(
        ModelKind::TemperatureRegressor,
        config.schema.clone(),
        report.train_rows,
        regressor,
    )?;
    let classifier = ModelArtifact::new(
        ModelKind::RainClassifier,
        config.schema.clone(),
        report.train_rows,
        classifier,
    )?;
    save_model_pair(
        (config.regressor_path.as_path(), &regressor),
        (config.classifier_path.as_path(), &classifier),
    )?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Reading;
    use crate::persist::load_model;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tracing_subscriber::fmt::MakeWriter;

    fn row(i: usize, rain_next: f64) -> LabeledRow {
        let temp = 20.0 + i as f64 / 10.0;
        LabeledRow {
            reading: Reading::new(i.to_string())
                .with_channel("Temperature", temp)
                .with_channel("Humidity", 60.0 - i as f64)
                .with_channel("AQI_Analog", 300.0 + (i % 3) as f64)
                .with_channel("Wind_Analog", 12.0)
                .with_channel("Wind_m_s", 0.5 * (i % 4) as f64)
                .with_channel("LDR_Digital", (i % 2) as f64)
                .with_channel("Rain_Digital", (i % 2) as f64)
                .with_channel("Pressure_hPa", -999.0),
            temp_next: temp + 0.1,
            rain_next,
        }
    }

    fn rows(n: usize) -> Vec<LabeledRow> {
        (0..n).map(|i| row(i, ((i + 1) % 2) as f64)).collect()
    }

    fn config(dir: &TempDir) -> TrainerConfig {
        TrainerConfig {
            labeled_table_path: dir.path().join("dataset.csv"),
            regressor_path: dir.path().join("temp.json"),
            classifier_path: dir.path().join("rain.json"),
            schema: FeatureSchema::standard(),
            min_training_rows: 3,
            small_dataset_rows: 10,
            split_min_rows: 20,
            test_fraction: 0.2,
            n_trees: 20,
            random_seed: 42,
        }
    }

    #[test]
    fn test_too_few_rows_rejected() {
        let dir = TempDir::new().unwrap();
        let err = train(&rows(2), &config(&dir)).err().unwrap();
        match err {
            PipelineError::InsufficientData { rows, required } => {
                assert_eq!(rows, 2);
                assert_eq!(required, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_small_dataset_trains_without_split() {
        let dir = TempDir::new().unwrap();
        let trained = train(&rows(5), &config(&dir)).unwrap();
        assert!(trained.report.small_dataset);
        assert_eq!(trained.report.train_rows, 5);
        assert_eq!(trained.report.test_rows, 0);
        assert!(trained.report.evaluation.is_none());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn train_logged(data: &[LabeledRow], config: &TrainerConfig) -> (Result<TrainedModels>, String) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, || train(data, config));
        let text = String::from_utf8_lossy(&logs.0.lock().unwrap()).into_owned();
        (result, text)
    }

    #[test]
    fn test_small_dataset_warning_comes_from_training() {
        let dir = TempDir::new().unwrap();
        let (result, text) = train_logged(&rows(5), &config(&dir));
        assert!(result.unwrap().report.small_dataset);
        assert!(text.contains("WARN"), "{text}");
        assert!(text.contains("small_dataset"), "{text}");

        let (result, text) = train_logged(&rows(12), &config(&dir));
        assert!(!result.unwrap().report.small_dataset);
        assert!(!text.contains("small_dataset"), "{text}");

        let (result, text) = train_logged(&rows(2), &config(&dir));
        assert!(result.is_err());
        assert!(!text.contains("small_dataset"), "{text}");
    }

    #[test]
    fn test_split_and_evaluation() {
        let dir = TempDir::new().unwrap();
        let trained = train(&rows(24), &config(&dir)).unwrap();
        let report = &trained.report;
        assert!(!report.small_dataset);
        assert_eq!(report.test_rows, 5);
        assert_eq!(report.train_rows, 19);

        let evaluation = report.evaluation.unwrap();
        assert!(evaluation.r2 > 0.99, "r2 = {}", evaluation.r2);
        assert!((0.0..=1.0).contains(&evaluation.accuracy));
        assert_eq!(report.rain_classes, vec![0, 1]);
    }

    #[test]
    fn test_constant_rain_gives_single_class() {
        let dir = TempDir::new().unwrap();
        let data: Vec<_> = (0..6).map(|i| row(i, 0.0)).collect();
        let trained = train(&data, &config(&dir)).unwrap();
        assert_eq!(trained.classifier.classes(), &[0]);
        assert_eq!(trained.report.rain_classes, vec![0]);
    }

    #[test]
    fn test_incomplete_rows_skipped_before_threshold() {
        let dir = TempDir::new().unwrap();
        let mut data = rows(4);
        data[1].reading.channels.remove("Wind_m_s");
        data[2].reading.channels.remove("Humidity");

        let err = train(&data, &config(&dir)).err().unwrap();
        assert!(matches!(err, PipelineError::InsufficientData { rows: 2, .. }));

        data.extend((4..8).map(|i| row(i, 1.0)));
        let trained = train(&data, &config(&dir)).unwrap();
        assert_eq!(trained.report.rows, 6);
        assert_eq!(trained.report.skipped_rows, 2);
    }

    #[test]
    fn test_run_persists_both_artifacts() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let data = rows(12);
        let channels = table::channel_columns(data.iter().map(|r| &r.reading));
        table::write_labeled(&config.labeled_table_path, &channels, &data).unwrap();

        let report = run(&config).unwrap();
        assert_eq!(report.rows, 12);

        let regressor: ModelArtifact<LinearRegression> =
            load_model(&config.regressor_path, ModelKind::TemperatureRegressor).unwrap();
        assert_eq!(regressor.features, FeatureSchema::standard());
        assert_eq!(regressor.trained_rows, 12);
        assert_eq!(regressor.model.coefficients.len(), 7);

        let classifier: ModelArtifact<RandomForestClassifier> =
            load_model(&config.classifier_path, ModelKind::RainClassifier).unwrap();
        assert_eq!(classifier.model.n_features(), 7);
    }

    #[test]
    fn test_run_leaves_artifacts_untouched_on_insufficient_data() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let data = rows(2);
        let channels = table::channel_columns(data.iter().map(|r| &r.reading));
        table::write_labeled(&config.labeled_table_path, &channels, &data).unwrap();

        assert!(run(&config).is_err());
        assert!(!config.regressor_path.exists());
        assert!(!config.classifier_path.exists());
    }

    #[test]
    fn test_run_failure_on_second_artifact_keeps_first() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let data = rows(12);
        let channels = table::channel_columns(data.iter().map(|r| &r.reading));
        table::write_labeled(&config.labeled_table_path, &channels, &data).unwrap();
        run(&config).unwrap();
        let regressor_before = std::fs::read(&config.regressor_path).unwrap();

        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let blocked = TrainerConfig {
            classifier_path: blocker.join("rain.json"),
            ..config.clone()
        };
        let more = rows(16);
        table::write_labeled(&config.labeled_table_path, &channels, &more).unwrap();

        assert!(run(&blocked).is_err());
        assert_eq!(std::fs::read(&config.regressor_path).unwrap(), regressor_before);
        assert!(!dir.path().join("temp.json.tmp").exists());
    }

    #[test]
    fn test_run_failure_on_classifier_leaves_no_regressor() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let config = TrainerConfig {
            classifier_path: blocker.join("rain.json"),
            ..config(&dir)
        };
        let data = rows(12);
        let channels = table::channel_columns(data.iter().map(|r| &r.reading));
        table::write_labeled(&config.labeled_table_path, &channels, &data).unwrap();

        assert!(run(&config).is_err());
        assert!(!config.regressor_path.exists());
    }

    #[test]
    fn test_missing_labeled_table() {
        let dir = TempDir::new().unwrap();
        let err = run(&config(&dir)).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput { .. }));
    }
}
