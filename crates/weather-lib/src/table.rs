//! Raw and labeled table artifacts
//!
//! Both tables are CSV files with an `id` column followed by one column per
//! sensor channel, sorted by name. Empty cells mean the reading did not carry
//! that channel. Values are written in shortest round-trip form so rewriting
//! unchanged data produces identical bytes.

use crate::error::{PipelineError, Result};
use crate::models::{LabeledRow, Reading, ID_COLUMN};
use crate::persist::write_atomic;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Label column holding the next temperature
pub const TEMP_NEXT_COLUMN: &str = "Temp_next_1h";

/// Label column holding the next rain flag
pub const RAIN_NEXT_COLUMN: &str = "Rain_next_1h";

/// Sorted union of channel names across readings
pub fn channel_columns<'a>(readings: impl IntoIterator<Item = &'a Reading>) -> Vec<String> {
    readings
        .into_iter()
        .flat_map(|r| r.channels.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Overwrite the raw table with `readings` in the given order
pub fn write_raw(path: &Path, readings: &[Reading]) -> Result<()> {
    let channels = channel_columns(readings);
    let mut header = vec![ID_COLUMN.to_string()];
    header.extend(channels.iter().cloned());

    let records = readings.iter().map(|r| reading_cells(r, &channels));
    write_csv(path, &header, records)
}

/// Overwrite the labeled table
///
/// `channels` fixes the feature columns so an empty table keeps the raw
/// table's layout.
pub fn write_labeled(path: &Path, channels: &[String], rows: &[LabeledRow]) -> Result<()> {
    let mut header = vec![ID_COLUMN.to_string()];
    header.extend(channels.iter().cloned());
    header.push(TEMP_NEXT_COLUMN.to_string());
    header.push(RAIN_NEXT_COLUMN.to_string());

    let records = rows.iter().map(|row| {
        let mut cells = reading_cells(&row.reading, channels);
        cells.push(format_value(row.temp_next));
        cells.push(format_value(row.rain_next));
        cells
    });
    write_csv(path, &header, records)
}

pub fn read_raw(path: &Path) -> Result<Vec<Reading>> {
    let (header, records) = read_csv(path)?;
    let id_idx = column_index(path, &header, ID_COLUMN)?;

    records
        .iter()
        .enumerate()
        .map(|(line, record)| parse_reading(path, &header, record, id_idx, &[], line))
        .collect()
}

pub fn read_labeled(path: &Path) -> Result<Vec<LabeledRow>> {
    let (header, records) = read_csv(path)?;
    let id_idx = column_index(path, &header, ID_COLUMN)?;
    let temp_idx = column_index(path, &header, TEMP_NEXT_COLUMN)?;
    let rain_idx = column_index(path, &header, RAIN_NEXT_COLUMN)?;

    records
        .iter()
        .enumerate()
        .map(|(line, record)| {
            let reading = parse_reading(path, &header, record, id_idx, &[temp_idx, rain_idx], line)?;
            let temp_next = parse_label(path, record, temp_idx, TEMP_NEXT_COLUMN, line)?;
            let rain_next = parse_label(path, record, rain_idx, RAIN_NEXT_COLUMN, line)?;
            Ok(LabeledRow {
                reading,
                temp_next,
                rain_next,
            })
        })
        .collect()
}

fn reading_cells(reading: &Reading, channels: &[String]) -> Vec<String> {
    let mut cells = Vec::with_capacity(channels.len() + 1);
    cells.push(reading.id.clone());
    cells.extend(
        channels
            .iter()
            .map(|c| reading.channel(c).map(format_value).unwrap_or_default()),
    );
    cells
}

fn format_value(value: f64) -> String {
    value.to_string()
}

fn write_csv(
    path: &Path,
    header: &[String],
    records: impl Iterator<Item = Vec<String>>,
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(header)
        .map_err(|e| PipelineError::table(path, e))?;
    let mut rows = 0usize;
    for record in records {
        writer
            .write_record(&record)
            .map_err(|e| PipelineError::table(path, e))?;
        rows += 1;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| PipelineError::table(path, e.error()))?;

    write_atomic(path, &bytes)?;
    debug!(path = %path.display(), rows, "Table written");
    Ok(())
}

fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<csv::StringRecord>)> {
    if !path.exists() {
        return Err(PipelineError::missing_input(path, "file not found"));
    }
    let mut reader = csv::Reader::from_path(path).map_err(|e| PipelineError::table(path, e))?;
    let header: Vec<String> = reader
        .headers()
        .map_err(|e| PipelineError::table(path, e))?
        .iter()
        .map(str::to_string)
        .collect();
    if header.iter().all(String::is_empty) {
        return Err(PipelineError::missing_input(path, "table is empty"));
    }
    let records = reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| PipelineError::table(path, e))?;
    Ok((header, records))
}

fn column_index(path: &Path, header: &[String], name: &str) -> Result<usize> {
    header
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| PipelineError::table(path, format!("column {name} not found")))
}

fn parse_reading(
    path: &Path,
    header: &[String],
    record: &csv::StringRecord,
    id_idx: usize,
    skip: &[usize],
    line: usize,
) -> Result<Reading> {
    let mut reading = Reading::new(record.get(id_idx).unwrap_or_default());
    for (idx, cell) in record.iter().enumerate() {
        if idx == id_idx || skip.contains(&idx) || cell.is_empty() {
            continue;
        }
        let value = cell
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                PipelineError::table(
                    path,
                    format!("row {}: column {} is not numeric: {cell:?}", line + 1, header[idx]),
                )
            })?;
        reading.channels.insert(header[idx].clone(), value);
    }
    Ok(reading)
}

fn parse_label(
    path: &Path,
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
    line: usize,
) -> Result<f64> {
    record
        .get(idx)
        .and_then(|cell| cell.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            PipelineError::table(
                path,
                format!("row {}: label {name} is missing or not finite", line + 1),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_readings() -> Vec<Reading> {
        vec![
            Reading::new("1000")
                .with_channel("timestamp_ms", 1000.0)
                .with_channel("Temperature", 20.1)
                .with_channel("Rain_Digital", 0.0),
            Reading::new("2000")
                .with_channel("timestamp_ms", 2000.0)
                .with_channel("Temperature", 20.2)
                .with_channel("Humidity", 55.5),
        ]
    }

    #[test]
    fn test_raw_table_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("raw.csv");
        write_raw(&path, &sample_readings()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("id,Humidity,Rain_Digital,Temperature,timestamp_ms"));
        assert_eq!(lines.next(), Some("1000,,0,20.1,1000"));
        assert_eq!(lines.next(), Some("2000,55.5,,20.2,2000"));
    }

    #[test]
    fn test_raw_table_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("raw.csv");
        let readings = sample_readings();
        write_raw(&path, &readings).unwrap();
        assert_eq!(read_raw(&path).unwrap(), readings);
    }

    #[test]
    fn test_missing_table_is_missing_input() {
        let dir = TempDir::new().unwrap();
        let err = read_raw(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput { .. }));
    }

    #[test]
    fn test_zero_byte_table_is_missing_input() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("raw.csv");
        std::fs::write(&path, b"").unwrap();
        match read_raw(&path) {
            Err(PipelineError::MissingInput { reason, .. }) => assert_eq!(reason, "table is empty"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(read_labeled(&path), Err(PipelineError::MissingInput { .. })));
    }

    #[test]
    fn test_non_finite_label_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("labeled.csv");
        for label in ["NaN", "inf", "-inf"] {
            std::fs::write(
                &path,
                format!("id,Temperature,Temp_next_1h,Rain_next_1h\n1,20,{label},0\n"),
            )
            .unwrap();
            match read_labeled(&path) {
                Err(PipelineError::Table { reason, .. }) => assert!(reason.contains("Temp_next_1h")),
                other => panic!("{label}: unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_non_numeric_cell_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("raw.csv");
        std::fs::write(&path, "id,Temperature\n1,warm\n").unwrap();
        assert!(matches!(read_raw(&path), Err(PipelineError::Table { .. })));
    }

    #[test]
    fn test_empty_labeled_table_keeps_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("labeled.csv");
        let channels = vec!["Temperature".to_string()];
        write_labeled(&path, &channels, &[]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "id,Temperature,Temp_next_1h,Rain_next_1h\n");
        assert!(read_labeled(&path).unwrap().is_empty());
    }

    #[test]
    fn test_labeled_table_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("labeled.csv");
        let readings = sample_readings();
        let rows = vec![LabeledRow {
            reading: readings[0].clone(),
            temp_next: 20.2,
            rain_next: 1.0,
        }];
        write_labeled(&path, &channel_columns(&readings), &rows).unwrap();
        assert_eq!(read_labeled(&path).unwrap(), rows);
    }
}
