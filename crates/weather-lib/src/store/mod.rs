//! Remote log and forecast stores
//!
//! This module provides:
//! - The [`LogStore`] / [`ForecastStore`] seams the stages talk to
//! - An HTTP implementation for a JSON key-value store
//! - An in-memory implementation for tests and dry runs

mod http;
mod memory;

pub use http::HttpStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::models::ForecastRecord;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

/// Connection settings for the remote stores
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Log collection endpoint (e.g., "https://<db>.firebaseio.com/WeatherLogs.json")
    pub log_url: String,
    /// Single forecast object endpoint
    pub forecast_url: String,
    pub request_timeout: Duration,
}

/// The remote log collection: key to record, or None when the store is empty
pub type LogCollection = Option<Map<String, Value>>;

/// Read side of the remote log
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Fetch the whole collection
    async fn fetch_logs(&self) -> Result<LogCollection>;
}

/// Single-slot forecast store
#[async_trait]
pub trait ForecastStore: Send + Sync {
    /// Replace the stored forecast
    async fn publish(&self, record: &ForecastRecord) -> Result<()>;

    /// Currently stored forecast, if any
    async fn latest(&self) -> Result<Option<ForecastRecord>>;
}

/// Interpret a raw collection payload
///
/// `null` means no data. Arrays come back from key-value stores whose keys
/// happen to be dense integers; they are re-keyed by index and holes are
/// dropped. Any other scalar is rejected.
pub(crate) fn collection_from_value(value: Value) -> std::result::Result<LogCollection, String> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        Value::Array(items) => Ok(Some(
            items
                .into_iter()
                .enumerate()
                .filter(|(_, item)| !item.is_null())
                .map(|(idx, item)| (idx.to_string(), item))
                .collect(),
        )),
        other => Err(format!("unexpected log payload: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_from_null() {
        assert_eq!(collection_from_value(Value::Null).unwrap(), None);
    }

    #[test]
    fn test_collection_from_object() {
        let collection = collection_from_value(json!({"a": {"Temperature": 1}})).unwrap().unwrap();
        assert_eq!(collection.len(), 1);
        assert!(collection.contains_key("a"));
    }

    #[test]
    fn test_collection_from_array_skips_holes() {
        let collection = collection_from_value(json!([null, {"Temperature": 1}, {"Temperature": 2}]))
            .unwrap()
            .unwrap();
        let keys: Vec<_> = collection.keys().cloned().collect();
        assert_eq!(keys, vec!["1", "2"]);
    }

    #[test]
    fn test_collection_from_scalar_rejected() {
        assert!(collection_from_value(json!(42)).is_err());
        assert!(collection_from_value(json!("oops")).is_err());
    }
}
