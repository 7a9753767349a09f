//! Model loading and inference
//!
//! Both artifacts are validated on load, then checked against the feature
//! schema inference will use. A model fitted on a different channel order
//! is refused rather than fed misaligned vectors.

use super::PredictorConfig;
use crate::error::{PipelineError, Result};
use crate::features::FeatureSchema;
use crate::ml::{ClassPrediction, LinearRegression, RandomForestClassifier};
use crate::models::Reading;
use crate::persist::{load_model, ModelArtifact, ModelKind};
use ndarray::aview1;
use std::path::Path;
use tracing::debug;

/// Raw model answers for one reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub temperature: f64,
    pub rain: ClassPrediction,
}

/// The regressor and classifier, loaded and schema-checked
pub struct ForecastModels {
    schema: FeatureSchema,
    regressor: ModelArtifact<LinearRegression>,
    classifier: ModelArtifact<RandomForestClassifier>,
}

impl ForecastModels {
    pub fn load(config: &PredictorConfig) -> Result<Self> {
        let regressor: ModelArtifact<LinearRegression> =
            load_model(&config.regressor_path, ModelKind::TemperatureRegressor)?;
        check_schema(&config.regressor_path, &regressor.features, &config.schema)?;
        if regressor.model.coefficients.len() != config.schema.len() {
            return Err(PipelineError::model_load(
                &config.regressor_path,
                format!(
                    "regressor has {} coefficients for {} features",
                    regressor.model.coefficients.len(),
                    config.schema.len()
                ),
            ));
        }

        let classifier: ModelArtifact<RandomForestClassifier> =
            load_model(&config.classifier_path, ModelKind::RainClassifier)?;
        check_schema(&config.classifier_path, &classifier.features, &config.schema)?;
        classifier
            .model
            .validate()
            .map_err(|reason| PipelineError::model_load(&config.classifier_path, reason))?;
        if classifier.model.n_features() != config.schema.len() {
            return Err(PipelineError::model_load(
                &config.classifier_path,
                format!(
                    "classifier expects {} features, schema has {}",
                    classifier.model.n_features(),
                    config.schema.len()
                ),
            ));
        }

        debug!(
            regressor_trained_at = regressor.trained_at,
            classifier_trained_at = classifier.trained_at,
            rain_classes = ?classifier.model.classes(),
            "Forecast models loaded"
        );

        Ok(Self {
            schema: config.schema.clone(),
            regressor,
            classifier,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Predict from a reading that carries every schema channel
    pub fn predict(&self, reading: &Reading) -> Option<Prediction> {
        let features = self.schema.extract(reading)?;
        let features = aview1(&features);
        Some(Prediction {
            temperature: self.regressor.model.predict(features),
            rain: self.classifier.model.classify(features),
        })
    }
}

fn check_schema(path: &Path, trained: &FeatureSchema, expected: &FeatureSchema) -> Result<()> {
    if trained != expected {
        return Err(PipelineError::model_load(
            path,
            format!(
                "model was trained on features {:?}, inference uses {:?}",
                trained.channels(),
                expected.channels()
            ),
        ));
    }
    Ok(())
}
