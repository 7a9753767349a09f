//! Ingestion: remote log collection to raw table

use crate::error::Result;
use crate::models::{sort_chronologically, Reading};
use crate::store::LogStore;
use crate::table;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub raw_table_path: PathBuf,
    pub timestamp_column: String,
}

/// What an ingestion run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The remote collection was empty or absent; no table was written
    NoData,
    Written { rows: usize, sorted: bool },
}

/// Fetch the whole log collection and overwrite the raw table with it
pub async fn ingest(store: &dyn LogStore, config: &IngestConfig) -> Result<IngestOutcome> {
    let collection = match store.fetch_logs().await? {
        Some(collection) if !collection.is_empty() => collection,
        _ => return Ok(IngestOutcome::NoData),
    };

    let (readings, sorted) = flatten_logs(&collection, &config.timestamp_column);
    table::write_raw(&config.raw_table_path, &readings)?;

    Ok(IngestOutcome::Written {
        rows: readings.len(),
        sorted,
    })
}

/// Turn collection entries into readings, time-sorted when possible
///
/// Entries that are not records are skipped. Returns whether the readings
/// were sorted by the timestamp channel.
pub fn flatten_logs(collection: &Map<String, Value>, timestamp_column: &str) -> (Vec<Reading>, bool) {
    let mut readings: Vec<Reading> = collection
        .iter()
        .filter_map(|(key, entry)| match entry {
            Value::Object(record) => Some(Reading::from_record(key, record)),
            _ => {
                debug!(key = %key, "Skipping log entry that is not a record");
                None
            }
        })
        .collect();

    let sorted = sort_chronologically(&mut readings, timestamp_column);
    (readings, sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::table::read_raw;
    use serde_json::json;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> IngestConfig {
        IngestConfig {
            raw_table_path: dir.path().join("weather_logs_raw.csv"),
            timestamp_column: "timestamp_ms".to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_collection_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);

        for payload in [Value::Null, json!({})] {
            let store = MemoryStore::with_logs(payload);
            assert_eq!(ingest(&store, &config).await.unwrap(), IngestOutcome::NoData);
            assert!(!config.raw_table_path.exists());
        }
    }

    #[tokio::test]
    async fn test_ingest_sorts_by_timestamp_and_skips_malformed() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let store = MemoryStore::with_logs(json!({
            "a": {"timestamp_ms": 3000, "Temperature": 21.0},
            "b": {"timestamp_ms": 1000, "Temperature": 19.0},
            "c": "garbage",
            "d": {"timestamp_ms": 2000, "Temperature": 20.0},
        }));

        let outcome = ingest(&store, &config).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Written { rows: 3, sorted: true });

        let readings = read_raw(&config.raw_table_path).unwrap();
        let ids: Vec<_> = readings.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a"]);
        assert_eq!(readings[0].channel("Temperature"), Some(19.0));
    }

    #[tokio::test]
    async fn test_ingest_without_timestamp_keeps_collection_order() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let store = MemoryStore::with_logs(json!({
            "k1": {"Temperature": 25.0},
            "k2": {"Temperature": 15.0},
        }));

        let outcome = ingest(&store, &config).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Written { rows: 2, sorted: false });
        let readings = read_raw(&config.raw_table_path).unwrap();
        assert_eq!(readings[0].id, "k1");
        assert_eq!(readings[1].id, "k2");
    }

    #[tokio::test]
    async fn test_ingest_overwrites_previous_table() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let store = MemoryStore::with_logs(json!({
            "1": {"timestamp_ms": 1, "Temperature": 1.0},
            "2": {"timestamp_ms": 2, "Temperature": 2.0},
        }));
        ingest(&store, &config).await.unwrap();

        store
            .set_logs(json!({"3": {"timestamp_ms": 3, "Temperature": 3.0}}))
            .await;
        ingest(&store, &config).await.unwrap();

        let readings = read_raw(&config.raw_table_path).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].id, "3");
    }

    #[tokio::test]
    async fn test_only_malformed_entries_writes_empty_table() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let store = MemoryStore::with_logs(json!({"x": 1, "y": [1, 2]}));

        let outcome = ingest(&store, &config).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Written { rows: 0, sorted: false });
        assert!(read_raw(&config.raw_table_path).unwrap().is_empty());
    }
}
