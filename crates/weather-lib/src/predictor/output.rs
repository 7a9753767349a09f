//! Forecast record assembly

use super::inference::Prediction;
use crate::models::{ForecastRecord, Reading, HUMIDITY_CHANNEL, RAIN_CHANNEL, TEMPERATURE_CHANNEL};

/// Combine a prediction with the reading it was made from
///
/// `generated_at_unix` is passed in so callers control the clock.
pub fn build_record(
    current: &Reading,
    prediction: &Prediction,
    timestamp_column: &str,
    generated_at_unix: i64,
) -> ForecastRecord {
    ForecastRecord {
        temp_pred_next: prediction.temperature,
        rain_prob_next: prediction.rain.positive_probability(),
        source_timestamp_ms: current.source_timestamp(timestamp_column),
        generated_at_unix,
        current_temp: current.channel(TEMPERATURE_CHANNEL).unwrap_or(f64::NAN),
        current_humidity: current.channel(HUMIDITY_CHANNEL).unwrap_or(f64::NAN),
        current_rain: current
            .channel(RAIN_CHANNEL)
            .map(|r| r.round() as i64)
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::ClassPrediction;

    fn reading() -> Reading {
        Reading::new("k1")
            .with_channel("timestamp_ms", 1_700_000_000_000.0)
            .with_channel("Temperature", 22.4)
            .with_channel("Humidity", 61.0)
            .with_channel("Rain_Digital", 1.0)
    }

    #[test]
    fn test_two_class_probability() {
        let prediction = Prediction {
            temperature: 22.5,
            rain: ClassPrediction::TwoClassProbability(0.37),
        };
        let record = build_record(&reading(), &prediction, "timestamp_ms", 1_700_000_300);
        assert_eq!(record.temp_pred_next, 22.5);
        assert_eq!(record.rain_prob_next, 0.37);
        assert_eq!(record.source_timestamp_ms, Some(1_700_000_000_000));
        assert_eq!(record.generated_at_unix, 1_700_000_300);
        assert_eq!(record.current_temp, 22.4);
        assert_eq!(record.current_humidity, 61.0);
        assert_eq!(record.current_rain, 1);
    }

    #[test]
    fn test_single_class_probability() {
        for (class, expected) in [(1, 1.0), (0, 0.0)] {
            let prediction = Prediction {
                temperature: 20.0,
                rain: ClassPrediction::SingleClass(class),
            };
            let record = build_record(&reading(), &prediction, "timestamp_ms", 0);
            assert_eq!(record.rain_prob_next, expected);
        }
    }

    #[test]
    fn test_timestamp_falls_back_to_numeric_id() {
        let current = Reading::new("1700000000123").with_channel("Temperature", 20.0);
        let prediction = Prediction {
            temperature: 20.0,
            rain: ClassPrediction::SingleClass(0),
        };
        let record = build_record(&current, &prediction, "timestamp_ms", 0);
        assert_eq!(record.source_timestamp_ms, Some(1_700_000_000_123));

        let unkeyed = Reading::new("-Nabc").with_channel("Temperature", 20.0);
        let record = build_record(&unkeyed, &prediction, "timestamp_ms", 0);
        assert_eq!(record.source_timestamp_ms, None);
    }
}
