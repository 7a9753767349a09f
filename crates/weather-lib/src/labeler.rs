//! Labeler: raw table to next-step supervised dataset
//!
//! Every reading is paired with the target channels of the reading
//! `step_ahead` rows later in time order. The trailing rows that have no
//! such successor are dropped, never padded.

use crate::error::{PipelineError, Result};
use crate::models::{sort_chronologically, LabeledRow, Reading, RAIN_CHANNEL, TEMPERATURE_CHANNEL};
use crate::table;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct LabelerConfig {
    pub raw_table_path: PathBuf,
    pub labeled_table_path: PathBuf,
    pub timestamp_column: String,
    /// Label horizon in rows
    pub step_ahead: usize,
}

/// Row counts of a labeling run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSummary {
    pub input_rows: usize,
    pub labeled_rows: usize,
}

/// Pair each reading with the targets `step_ahead` rows later
///
/// `readings` must already be in time order. A successor missing either
/// target channel leaves its row unlabeled, so the row is dropped.
pub fn label_readings(readings: &[Reading], step_ahead: usize) -> Vec<LabeledRow> {
    if step_ahead == 0 {
        return Vec::new();
    }
    readings
        .iter()
        .zip(readings.iter().skip(step_ahead))
        .filter_map(|(current, future)| {
            Some(LabeledRow {
                reading: current.clone(),
                temp_next: future.channel(TEMPERATURE_CHANNEL)?,
                rain_next: future.channel(RAIN_CHANNEL)?,
            })
        })
        .collect()
}

/// Read the raw table, label it, and overwrite the labeled table
pub fn run(config: &LabelerConfig) -> Result<LabelSummary> {
    if config.step_ahead == 0 {
        return Err(PipelineError::Config(
            "step_ahead must be at least 1".to_string(),
        ));
    }

    let mut readings = table::read_raw(&config.raw_table_path)?;
    if !sort_chronologically(&mut readings, &config.timestamp_column) && !readings.is_empty() {
        warn!(
            column = %config.timestamp_column,
            "Raw table has no timestamp channel, keeping stored row order"
        );
    }

    let rows = label_readings(&readings, config.step_ahead);
    let channels = table::channel_columns(&readings);
    table::write_labeled(&config.labeled_table_path, &channels, &rows)?;

    Ok(LabelSummary {
        input_rows: readings.len(),
        labeled_rows: rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{read_labeled, write_raw};
    use tempfile::TempDir;

    fn readings(n: usize) -> Vec<Reading> {
        (0..n)
            .map(|i| {
                Reading::new(format!("{}", 1000 + i))
                    .with_channel("timestamp_ms", (1000 + i * 300_000) as f64)
                    .with_channel("Temperature", 20.0 + i as f64 / 10.0)
                    .with_channel("Rain_Digital", (i % 2) as f64)
                    .with_channel("Humidity", 50.0)
            })
            .collect()
    }

    fn config(dir: &TempDir, step_ahead: usize) -> LabelerConfig {
        LabelerConfig {
            raw_table_path: dir.path().join("raw.csv"),
            labeled_table_path: dir.path().join("labeled.csv"),
            timestamp_column: "timestamp_ms".to_string(),
            step_ahead,
        }
    }

    #[test]
    fn test_row_count_and_alignment() {
        let data = readings(10);
        for k in 1..=12 {
            let rows = label_readings(&data, k);
            assert_eq!(rows.len(), data.len().saturating_sub(k), "k = {}", k);
            for (i, row) in rows.iter().enumerate() {
                assert_eq!(row.reading, data[i]);
                assert_eq!(Some(row.temp_next), data[i + k].channel("Temperature"));
                assert_eq!(Some(row.rain_next), data[i + k].channel("Rain_Digital"));
            }
        }
    }

    #[test]
    fn test_successor_without_target_drops_row() {
        let mut data = readings(4);
        data[2].channels.remove("Temperature");
        let rows = label_readings(&data, 1);
        let ids: Vec<_> = rows.iter().map(|r| r.reading.id.as_str()).collect();
        assert_eq!(ids, vec!["1000", "1002"]);
    }

    #[test]
    fn test_run_sorts_before_labeling() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 1);
        let mut data = readings(5);
        data.reverse();
        write_raw(&config.raw_table_path, &data).unwrap();

        let summary = run(&config).unwrap();
        assert_eq!(summary, LabelSummary { input_rows: 5, labeled_rows: 4 });

        let rows = read_labeled(&config.labeled_table_path).unwrap();
        assert_eq!(rows[0].reading.id, "1000");
        assert_eq!(rows[0].temp_next, 20.1);
        assert_eq!(rows[3].temp_next, 20.4);
    }

    #[test]
    fn test_too_few_rows_gives_empty_table() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 3);
        write_raw(&config.raw_table_path, &readings(3)).unwrap();

        let summary = run(&config).unwrap();
        assert_eq!(summary.labeled_rows, 0);
        assert!(read_labeled(&config.labeled_table_path).unwrap().is_empty());
    }

    #[test]
    fn test_relabeling_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, 2);
        write_raw(&config.raw_table_path, &readings(15)).unwrap();

        run(&config).unwrap();
        let first = std::fs::read(&config.labeled_table_path).unwrap();
        run(&config).unwrap();
        let second = std::fs::read(&config.labeled_table_path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_raw_table() {
        let dir = TempDir::new().unwrap();
        let err = run(&config(&dir, 1)).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput { .. }));
    }

    #[test]
    fn test_zero_step_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(run(&config(&dir, 0)), Err(PipelineError::Config(_))));
    }
}
