pub mod discovery;
pub mod docker;
pub mod runtime;
pub mod tailer;
pub mod watcher;

pub use discovery::{DEFAULT_EXCLUDED_NAMES, MonitoringFilter, find_running_container};
pub use docker::DockerRuntime;
pub use runtime::{
    ContainerRuntime, ContainerSummary, EventStream, LifecycleEvent, LogByteStream,
    LogStreamOptions, RuntimeError,
};
pub use tailer::{StreamTailer, TailExit};
pub use watcher::{ContainerWatcher, ReconnectPolicy};
