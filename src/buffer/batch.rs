use crate::domain::LogRecord;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::sync::futures::Notified;
use uuid::Uuid;

use super::metrics::PipelineMetrics;

/// What caused a batch to be drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlushTrigger {
    SizeBased,
    TimeBased,
    Shutdown,
}

/// A drained, ordered group of records delivered in one request.
#[derive(Debug, Clone)]
pub struct Batch {
    id: String,
    entries: Vec<LogRecord>,
    trigger: FlushTrigger,
}

impl Batch {
    pub fn new(entries: Vec<LogRecord>, trigger: FlushTrigger) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entries,
            trigger,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LogRecord] {
        &self.entries
    }

    pub fn trigger(&self) -> FlushTrigger {
        self.trigger
    }
}

/// The pipeline's live record buffer.
///
/// Appends and drains are the only operations; both hold the lock just long
/// enough to touch the vector. Crossing the batch size raises a flush signal
/// that collapses with any signal still pending.
pub struct BatchBuffer {
    entries: Mutex<Vec<LogRecord>>,
    batch_size: usize,
    flush_signal: Notify,
    metrics: Arc<PipelineMetrics>,
}

impl BatchBuffer {
    pub fn new(batch_size: usize) -> Self {
        Self::with_metrics(batch_size, Arc::new(PipelineMetrics::new()))
    }

    pub fn with_metrics(batch_size: usize, metrics: Arc<PipelineMetrics>) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            entries: Mutex::new(Vec::with_capacity(batch_size * 2)),
            batch_size,
            flush_signal: Notify::new(),
            metrics,
        }
    }

    pub fn append(&self, record: LogRecord) {
        let len = {
            let mut entries = self.entries.lock();
            entries.push(record);
            entries.len()
        };
        self.metrics.record_append();

        if len >= self.batch_size {
            self.flush_signal.notify_one();
        }
    }

    /// Takes everything buffered so far, leaving the buffer empty.
    pub fn drain(&self) -> Vec<LogRecord> {
        let mut entries = self.entries.lock();
        std::mem::replace(&mut *entries, Vec::with_capacity(self.batch_size))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Resolves once a size-triggered flush has been requested.
    pub fn flush_requested(&self) -> Notified<'_> {
        self.flush_signal.notified()
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }
}

impl std::fmt::Debug for BatchBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchBuffer")
            .field("len", &self.len())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
