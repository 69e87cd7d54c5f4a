use super::runtime::{ContainerRuntime, LogStreamOptions};
use crate::buffer::BatchBuffer;
use crate::domain::ContainerRef;
use crate::parser::{LineNormalizer, LineSplitter, strip_frame_header};
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why a tailer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailExit {
    Cancelled,
    EndOfStream,
    StreamError,
}

/// Follows one container's log stream, normalizing every complete line into
/// the shared buffer.
#[derive(Clone)]
pub struct StreamTailer {
    runtime: Arc<dyn ContainerRuntime>,
    buffer: Arc<BatchBuffer>,
    normalizer: Arc<LineNormalizer>,
    options: LogStreamOptions,
}

impl StreamTailer {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        buffer: Arc<BatchBuffer>,
        normalizer: Arc<LineNormalizer>,
        options: LogStreamOptions,
    ) -> Self {
        Self {
            runtime,
            buffer,
            normalizer,
            options,
        }
    }

    /// Reads until the stream ends, fails, or `cancel` fires. Cancellation is
    /// checked before every line; a read already in flight is allowed to finish.
    pub async fn tail(&self, container: ContainerRef, cancel: CancellationToken) -> TailExit {
        info!(
            "Starting to tail logs for container: {} ({})",
            container.name,
            container.short_id()
        );

        let mut stream = self.runtime.open_log_stream(&container.id, &self.options);
        let mut splitter = LineSplitter::new();
        let mut lines = 0usize;

        let exit = loop {
            let chunk = tokio::select! {
                biased;
                () = cancel.cancelled() => break TailExit::Cancelled,
                next = stream.next() => next,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    for line in splitter.push(&bytes) {
                        if cancel.is_cancelled() {
                            break;
                        }
                        self.ingest(&line, &container);
                        lines += 1;
                    }
                    if cancel.is_cancelled() {
                        break TailExit::Cancelled;
                    }
                }
                Some(Err(e)) => {
                    warn!("Error reading logs from container {}: {}", container.name, e);
                    break TailExit::StreamError;
                }
                None => {
                    if let Some(rest) = splitter.finish() {
                        self.ingest(&rest, &container);
                        lines += 1;
                    }
                    break TailExit::EndOfStream;
                }
            }
        };

        debug!("Tailer for {} read {} lines", container.name, lines);
        info!(
            "Stopped tailing logs for container: {} ({:?})",
            container.name, exit
        );
        exit
    }

    fn ingest(&self, line: &[u8], container: &ContainerRef) {
        let text = String::from_utf8_lossy(strip_frame_header(line));
        self.buffer
            .append(self.normalizer.normalize(&text, container));
    }
}

impl std::fmt::Debug for StreamTailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTailer")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
