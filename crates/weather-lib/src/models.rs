//! Core data models for the forecast pipeline

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Column holding the collection key of a reading
pub const ID_COLUMN: &str = "id";

/// Channel whose next value is the continuous label
pub const TEMPERATURE_CHANNEL: &str = "Temperature";

pub const HUMIDITY_CHANNEL: &str = "Humidity";

/// Channel whose next value is the binary label
pub const RAIN_CHANNEL: &str = "Rain_Digital";

/// Class value of the binary label treated as "it rains"
pub const POSITIVE_CLASS: i64 = 1;

/// One sensor sample from the remote log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: String,
    pub channels: BTreeMap<String, f64>,
}

impl Reading {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            channels: BTreeMap::new(),
        }
    }

    pub fn with_channel(mut self, name: impl Into<String>, value: f64) -> Self {
        self.channels.insert(name.into(), value);
        self
    }

    pub fn channel(&self, name: &str) -> Option<f64> {
        self.channels.get(name).copied()
    }

    /// Flatten one remote log record into a reading keyed by `key`
    ///
    /// Numbers are kept, booleans become 1/0 and numeric strings are parsed.
    /// Anything else is not a sensor channel and is skipped.
    pub fn from_record(key: &str, record: &Map<String, Value>) -> Self {
        let mut reading = Reading::new(key);
        for (name, value) in record {
            if name == ID_COLUMN {
                continue;
            }
            let numeric = match value {
                Value::Number(n) => n.as_f64(),
                Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            match numeric.filter(|v| v.is_finite()) {
                Some(v) => {
                    reading.channels.insert(name.clone(), v);
                }
                None => debug!(id = %key, field = %name, "Skipping non-numeric field"),
            }
        }
        reading
    }

    /// Timestamp of the reading, falling back to a numeric id
    pub fn source_timestamp(&self, timestamp_column: &str) -> Option<i64> {
        self.channel(timestamp_column)
            .map(|ts| ts as i64)
            .or_else(|| self.id.trim().parse::<i64>().ok())
    }
}

/// A reading paired with the target values observed `step_ahead` rows later
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRow {
    pub reading: Reading,
    /// Next temperature
    pub temp_next: f64,
    /// Next rain flag (0 or 1)
    pub rain_next: f64,
}

/// The record published to the forecast slot
///
/// Field names and flatness are part of the downstream contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub temp_pred_next: f64,
    /// Probability of rain in [0, 1]
    pub rain_prob_next: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_timestamp_ms: Option<i64>,
    /// Seconds since the Unix epoch
    pub generated_at_unix: i64,
    pub current_temp: f64,
    pub current_humidity: f64,
    pub current_rain: i64,
}

/// Stable ascending sort by the timestamp channel
///
/// Readings without the channel keep their relative order after all
/// timestamped ones. Returns false, leaving the order untouched, when no
/// reading carries a timestamp.
pub fn sort_chronologically(readings: &mut [Reading], timestamp_column: &str) -> bool {
    if !readings
        .iter()
        .any(|r| r.channels.contains_key(timestamp_column))
    {
        return false;
    }
    readings.sort_by(|a, b| {
        match (a.channel(timestamp_column), b.channel(timestamp_column)) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });
    true
}
