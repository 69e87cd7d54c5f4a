use super::config::Config;
use crate::buffer::{BatchBuffer, FlushDispatcher, FlushTrigger, MetricsSnapshot};
use crate::collector::{
    ContainerRuntime, ContainerWatcher, LogStreamOptions, MonitoringFilter, ReconnectPolicy,
    RuntimeError, StreamTailer,
};
use crate::parser::LineNormalizer;
use crate::sender::LogSink;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Everything the pipeline needs from the configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub default_project_id: String,
    pub filter: MonitoringFilter,
    pub stream_options: LogStreamOptions,
    pub reconnect: ReconnectPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            flush_interval: Duration::from_secs(5),
            default_project_id: String::new(),
            filter: MonitoringFilter::default(),
            stream_options: LogStreamOptions::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            batch_size: config.batch_size,
            flush_interval: config.flush_interval,
            default_project_id: config.default_project_id().to_string(),
            filter: config.monitoring_filter(),
            stream_options: config.log_stream_options(),
            reconnect: config.reconnect_policy(),
        }
    }
}

/// Wires watcher, tailers, buffer and dispatcher together and owns the
/// shutdown sequence.
pub struct Pipeline {
    runtime: Arc<dyn ContainerRuntime>,
    sink: Arc<dyn LogSink>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        sink: Arc<dyn LogSink>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            runtime,
            sink,
            settings,
        }
    }

    /// Runs until `cancel` fires, then stops the tailers, drains the buffer
    /// one last time and returns the final counters.
    ///
    /// Fails only when the initial container listing fails; the buffer is
    /// still drained in that case.
    pub async fn run(self, cancel: CancellationToken) -> Result<MetricsSnapshot, RuntimeError> {
        let Pipeline {
            runtime,
            sink,
            settings,
        } = self;

        info!(
            "Starting pipeline (batch_size={}, flush_interval={:?})",
            settings.batch_size, settings.flush_interval
        );

        let buffer = Arc::new(BatchBuffer::new(settings.batch_size));
        let dispatcher = Arc::new(FlushDispatcher::new(
            Arc::clone(&buffer),
            sink,
            settings.flush_interval,
        ));

        let dispatcher_task = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            let cancel = cancel.clone();
            async move { dispatcher.run(cancel).await }
        });

        let tracker = TaskTracker::new();
        let tailer = StreamTailer::new(
            Arc::clone(&runtime),
            Arc::clone(&buffer),
            Arc::new(LineNormalizer::new(settings.default_project_id)),
            settings.stream_options,
        );
        let watcher = ContainerWatcher::new(runtime, settings.filter, tailer, tracker.clone())
            .with_reconnect(settings.reconnect);

        let outcome = watcher.run(cancel.clone()).await;
        match &outcome {
            Ok(()) if !cancel.is_cancelled() => {
                warn!("Container discovery stopped; existing tailers keep running until shutdown");
                cancel.cancelled().await;
            }
            Ok(()) => {}
            Err(e) => {
                error!("Initial container scan failed: {}", e);
                cancel.cancel();
            }
        }

        info!("Shutting down: waiting for {} tailer(s)", tracker.len());
        tracker.close();
        tracker.wait().await;

        if let Err(e) = dispatcher_task.await {
            error!("Flush dispatcher task failed: {}", e);
        }

        dispatcher.flush(FlushTrigger::Shutdown).await;

        let snapshot = buffer.metrics().snapshot();
        info!(
            "Pipeline stopped: {} records read, {} batches sent ({} records), {} batches dropped ({} records)",
            snapshot.records_appended,
            snapshot.batches_delivered,
            snapshot.records_delivered,
            snapshot.batches_dropped,
            snapshot.records_dropped
        );

        outcome.map(|()| snapshot)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
