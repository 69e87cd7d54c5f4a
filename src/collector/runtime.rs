use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Docker API error: {0}")]
    DockerError(#[from] bollard::errors::Error),
    #[error("Container runtime unavailable: {0}")]
    Unavailable(String),
    #[error("Event stream closed")]
    EventStreamClosed,
}

/// A running container as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    /// Display name, leading `/` already stripped.
    pub name: String,
}

/// One entry of the runtime's lifecycle event feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    /// Object kind, e.g. `container`, `network`, `image`.
    pub kind: String,
    /// What happened, e.g. `start`, `die`.
    pub action: String,
    pub actor_id: String,
}

impl LifecycleEvent {
    pub fn is_container_start(&self) -> bool {
        self.kind == "container" && self.action == "start"
    }
}

#[derive(Debug, Clone)]
pub struct LogStreamOptions {
    pub stdout: bool,
    pub stderr: bool,
    pub follow: bool,
    /// Historical lines replayed before following.
    pub tail_lines: usize,
    pub timestamps: bool,
}

impl Default for LogStreamOptions {
    fn default() -> Self {
        Self {
            stdout: true,
            stderr: true,
            follow: true,
            tail_lines: 100,
            timestamps: false,
        }
    }
}

pub type EventStream = BoxStream<'static, Result<LifecycleEvent, RuntimeError>>;
pub type LogByteStream = BoxStream<'static, Result<Bytes, RuntimeError>>;

/// The slice of a container runtime the agent depends on.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Cheap round-trip used to fail fast at startup.
    async fn ping(&self) -> Result<(), RuntimeError>;

    async fn list_running_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError>;

    fn lifecycle_events(&self) -> EventStream;

    /// Combined stdout/stderr of one container as raw byte chunks.
    /// Chunk boundaries carry no meaning; callers split lines themselves.
    fn open_log_stream(&self, container_id: &str, options: &LogStreamOptions) -> LogByteStream;
}
