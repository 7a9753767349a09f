//! In-memory store used by tests and offline runs

use super::{collection_from_value, ForecastStore, LogCollection, LogStore};
use crate::error::{PipelineError, Result};
use crate::models::ForecastRecord;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

const MEMORY_URL: &str = "memory://";

/// Holds a log payload and the single forecast slot in process memory
#[derive(Default)]
pub struct MemoryStore {
    logs: RwLock<Value>,
    forecast: RwLock<Option<ForecastRecord>>,
    reject_publish: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a raw log payload, as the remote would return it
    pub fn with_logs(logs: Value) -> Self {
        Self {
            logs: RwLock::new(logs),
            ..Default::default()
        }
    }

    /// Store whose forecast slot refuses writes
    pub fn rejecting_publish() -> Self {
        Self {
            reject_publish: true,
            ..Default::default()
        }
    }

    pub async fn set_logs(&self, logs: Value) {
        *self.logs.write().await = logs;
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn fetch_logs(&self) -> Result<LogCollection> {
        let value = self.logs.read().await.clone();
        collection_from_value(value).map_err(|reason| PipelineError::Fetch {
            url: MEMORY_URL.to_string(),
            reason,
        })
    }
}

#[async_trait]
impl ForecastStore for MemoryStore {
    async fn publish(&self, record: &ForecastRecord) -> Result<()> {
        if self.reject_publish {
            return Err(PipelineError::Publish {
                url: MEMORY_URL.to_string(),
                reason: "forecast slot is read-only".to_string(),
            });
        }
        *self.forecast.write().await = Some(record.clone());
        Ok(())
    }

    async fn latest(&self) -> Result<Option<ForecastRecord>> {
        Ok(self.forecast.read().await.clone())
    }
}
