pub mod http;

pub use http::{BATCH_PATH, HttpSink, HttpSinkConfig, LogBatchPayload};

use crate::buffer::Batch;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("HTTP error: {status} - {body}")]
    HttpError { status: u16, body: String },
}

/// Outcome of an accepted batch.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub status_code: u16,
    pub records: usize,
    pub bytes_sent: usize,
    pub latency: Duration,
}

/// Where drained batches go. Delivery is at-most-once: implementations make a
/// single attempt and report the result; callers never retry.
#[async_trait]
pub trait LogSink: Send + Sync + 'static {
    async fn deliver(&self, batch: Batch) -> Result<DeliveryReceipt, DeliveryError>;
}
