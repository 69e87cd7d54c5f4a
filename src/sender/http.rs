use super::{DeliveryError, DeliveryReceipt, LogSink};
use crate::buffer::Batch;
use crate::domain::LogRecord;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// Path appended to the configured endpoint for batch ingestion.
pub const BATCH_PATH: &str = "/logs/batch";

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Base URL, e.g. `https://collector.example.com/api/v1`.
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSinkConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/api/v1".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(30),
            user_agent: format!("loghealer-agent/{}", crate::VERSION),
        }
    }
}

/// Wire body: `{"logs": [...]}`.
#[derive(Debug, Serialize)]
pub struct LogBatchPayload<'a> {
    pub logs: &'a [LogRecord],
}

/// Delivers batches with one JSON POST each.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    batch_url: Url,
    headers: HeaderMap,
}

impl HttpSink {
    pub fn new(config: HttpSinkConfig) -> Result<Self, DeliveryError> {
        let batch_url = batch_url(&config.endpoint)?;

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                DeliveryError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut api_key = HeaderValue::from_str(&config.api_key).map_err(|e| {
            DeliveryError::InvalidConfiguration(format!("Invalid API key header value: {e}"))
        })?;
        api_key.set_sensitive(true);
        headers.insert(HeaderName::from_static(API_KEY_HEADER), api_key);

        Ok(Self {
            client,
            batch_url,
            headers,
        })
    }

    pub fn batch_url(&self) -> &Url {
        &self.batch_url
    }

    pub fn encode(batch: &Batch) -> Result<Vec<u8>, DeliveryError> {
        let payload = LogBatchPayload {
            logs: batch.entries(),
        };
        Ok(serde_json::to_vec(&payload)?)
    }
}

/// Joins the endpoint base and the batch path without doubling slashes.
fn batch_url(endpoint: &str) -> Result<Url, DeliveryError> {
    let mut url: Url = endpoint.parse().map_err(|e| {
        DeliveryError::InvalidConfiguration(format!("Invalid endpoint URL '{endpoint}': {e}"))
    })?;
    let path = format!("{}{}", url.path().trim_end_matches('/'), BATCH_PATH);
    url.set_path(&path);
    Ok(url)
}

#[async_trait]
impl LogSink for HttpSink {
    async fn deliver(&self, batch: Batch) -> Result<DeliveryReceipt, DeliveryError> {
        let start = Instant::now();
        let body = Self::encode(&batch)?;
        let bytes_sent = body.len();

        debug!(
            "Posting batch {} ({} records, {} bytes) to {}",
            batch.id(),
            batch.size(),
            bytes_sent,
            self.batch_url
        );

        let response = self
            .client
            .post(self.batch_url.clone())
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::HttpError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(DeliveryReceipt {
            status_code: status.as_u16(),
            records: batch.size(),
            bytes_sent,
            latency: start.elapsed(),
        })
    }
}
