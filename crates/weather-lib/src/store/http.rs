//! HTTP client for a JSON key-value store (Firebase Realtime Database style)

use super::{collection_from_value, ForecastStore, LogCollection, LogStore, StoreConfig};
use crate::error::{PipelineError, Result};
use crate::models::ForecastRecord;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

/// Store backed by plain GET/PUT requests on two fixed endpoints
pub struct HttpStore {
    client: Client,
    log_url: Url,
    forecast_url: Url,
}

impl HttpStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to create HTTP client: {e}")))?;

        let log_url = Url::parse(&config.log_url)
            .map_err(|e| PipelineError::Config(format!("invalid log URL: {e}")))?;
        let forecast_url = Url::parse(&config.forecast_url)
            .map_err(|e| PipelineError::Config(format!("invalid forecast URL: {e}")))?;

        Ok(Self {
            client,
            log_url,
            forecast_url,
        })
    }

    async fn get_json(&self, url: &Url) -> std::result::Result<Value, String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| format!("failed to send request: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("store error ({status}): {body}"));
        }

        response
            .json()
            .await
            .map_err(|e| format!("failed to parse response: {e}"))
    }
}

#[async_trait]
impl LogStore for HttpStore {
    async fn fetch_logs(&self) -> Result<LogCollection> {
        let fetch_error = |reason: String| PipelineError::Fetch {
            url: self.log_url.to_string(),
            reason,
        };

        debug!(url = %self.log_url, "Fetching weather logs");
        let value = self.get_json(&self.log_url).await.map_err(fetch_error)?;
        let collection = collection_from_value(value).map_err(fetch_error)?;

        debug!(
            entries = collection.as_ref().map(|c| c.len()).unwrap_or(0),
            "Weather logs fetched"
        );
        Ok(collection)
    }
}

#[async_trait]
impl ForecastStore for HttpStore {
    async fn publish(&self, record: &ForecastRecord) -> Result<()> {
        let publish_error = |reason: String| PipelineError::Publish {
            url: self.forecast_url.to_string(),
            reason,
        };

        let response = self
            .client
            .put(self.forecast_url.clone())
            .json(record)
            .send()
            .await
            .map_err(|e| publish_error(format!("failed to send request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(publish_error(format!("store error ({status}): {body}")));
        }

        info!(url = %self.forecast_url, status = %status, "Forecast published");
        Ok(())
    }

    async fn latest(&self) -> Result<Option<ForecastRecord>> {
        let fetch_error = |reason: String| PipelineError::Fetch {
            url: self.forecast_url.to_string(),
            reason,
        };

        let value = self.get_json(&self.forecast_url).await.map_err(fetch_error)?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| fetch_error(format!("unexpected forecast payload: {e}")))
    }
}
