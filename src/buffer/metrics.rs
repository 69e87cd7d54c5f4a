use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free pipeline counters, shared by the buffer and the dispatcher.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    records_appended: AtomicU64,
    flushes: AtomicU64,
    batches_delivered: AtomicU64,
    records_delivered: AtomicU64,
    batches_dropped: AtomicU64,
    records_dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub records_appended: u64,
    pub flushes: u64,
    pub batches_delivered: u64,
    pub records_delivered: u64,
    pub batches_dropped: u64,
    pub records_dropped: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_append(&self) {
        self.records_appended.fetch_add(1, Ordering::Relaxed);
    }

    /// A non-empty drain handed to the sink.
    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self, records: usize) {
        self.batches_delivered.fetch_add(1, Ordering::Relaxed);
        self.records_delivered
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, records: usize) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
        self.records_dropped.fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_appended: self.records_appended.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            batches_delivered: self.batches_delivered.load(Ordering::Relaxed),
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
        }
    }
}
