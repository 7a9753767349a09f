//! Feature schema shared by training and inference
//!
//! The order of [`FEATURE_CHANNELS`] is the column order of every feature
//! vector the models see. Training and inference both build vectors through
//! [`FeatureSchema`], and persisted models record the schema they were fitted
//! with so a mismatch is caught at load time instead of silently skewing
//! predictions.

use crate::error::{PipelineError, Result};
use crate::models::Reading;
use serde::{Deserialize, Serialize};

/// Ordered sensor channels fed to both models
pub const FEATURE_CHANNELS: [&str; 7] = [
    "Temperature",
    "Humidity",
    "AQI_Analog",
    "Wind_Analog",
    "Wind_m_s",
    "LDR_Digital",
    "Rain_Digital",
];

/// Channels never used as features (the barometric sensor reports garbage)
pub const EXCLUDED_CHANNELS: [&str; 1] = ["Pressure_hPa"];

/// Ordered list of channels making up a feature vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    channels: Vec<String>,
}

impl FeatureSchema {
    /// The schema built from [`FEATURE_CHANNELS`]
    pub fn standard() -> Self {
        Self {
            channels: FEATURE_CHANNELS.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn new(channels: Vec<String>) -> Result<Self> {
        if channels.is_empty() {
            return Err(PipelineError::Config(
                "feature schema needs at least one channel".to_string(),
            ));
        }
        for (i, channel) in channels.iter().enumerate() {
            if EXCLUDED_CHANNELS.contains(&channel.as_str()) {
                return Err(PipelineError::Config(format!(
                    "channel {channel} is excluded from features"
                )));
            }
            if channels[..i].contains(channel) {
                return Err(PipelineError::Config(format!(
                    "channel {channel} listed twice in feature schema"
                )));
            }
        }
        Ok(Self { channels })
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Build the feature vector in schema order, or None if a channel is missing
    pub fn extract(&self, reading: &Reading) -> Option<Vec<f64>> {
        self.channels
            .iter()
            .map(|channel| reading.channel(channel))
            .collect()
    }

    /// Channels of the schema the reading does not carry
    pub fn missing_channels<'a>(&'a self, reading: &Reading) -> Vec<&'a str> {
        self.channels
            .iter()
            .filter(|channel| reading.channel(channel).is_none())
            .map(String::as_str)
            .collect()
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::standard()
    }
}
