use super::batch::{Batch, BatchBuffer, FlushTrigger};
use super::metrics::PipelineMetrics;
use crate::sender::{DeliveryReceipt, LogSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Drains the buffer into the sink on the size signal, on every tick of the
/// flush interval, and once more when asked to at shutdown.
pub struct FlushDispatcher {
    buffer: Arc<BatchBuffer>,
    sink: Arc<dyn LogSink>,
    flush_interval: Duration,
}

impl FlushDispatcher {
    pub fn new(buffer: Arc<BatchBuffer>, sink: Arc<dyn LogSink>, flush_interval: Duration) -> Self {
        Self {
            buffer,
            sink,
            flush_interval,
        }
    }

    pub fn buffer(&self) -> &Arc<BatchBuffer> {
        &self.buffer
    }

    fn metrics(&self) -> &PipelineMetrics {
        self.buffer.metrics()
    }

    /// Drains the buffer and delivers what was there. An empty drain is a
    /// no-op and returns `None` without touching the sink.
    ///
    /// Delivery happens after the buffer lock has been released; a failed
    /// batch is logged and dropped.
    pub async fn flush(&self, trigger: FlushTrigger) -> Option<DeliveryReceipt> {
        let entries = self.buffer.drain();
        if entries.is_empty() {
            debug!("Skipping {:?} flush: buffer empty", trigger);
            return None;
        }

        let batch = Batch::new(entries, trigger);
        let batch_id = batch.id().to_string();
        let count = batch.size();
        self.metrics().record_flush();

        match self.sink.deliver(batch).await {
            Ok(receipt) => {
                info!(
                    "Sent {} logs (batch {}, trigger {:?}, status {}) in {:?}",
                    count, batch_id, trigger, receipt.status_code, receipt.latency
                );
                self.metrics().record_delivered(count);
                Some(receipt)
            }
            Err(e) => {
                error!("Failed to send batch {} of {} logs: {}", batch_id, count, e);
                self.metrics().record_dropped(count);
                None
            }
        }
    }

    /// Runs the size and time triggers until `cancel` fires. The residual
    /// drain is left to the caller so it can run after the tailers stop.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Flush dispatcher started (batch_size={}, flush_interval={:?})",
            self.buffer.batch_size(),
            self.flush_interval
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = self.buffer.flush_requested() => {
                    self.flush(FlushTrigger::SizeBased).await;
                }
                _ = ticker.tick() => {
                    self.flush(FlushTrigger::TimeBased).await;
                }
            }
        }

        info!("Flush dispatcher stopped");
    }
}

impl std::fmt::Debug for FlushDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushDispatcher")
            .field("buffer", &self.buffer)
            .field("flush_interval", &self.flush_interval)
            .finish_non_exhaustive()
    }
}
