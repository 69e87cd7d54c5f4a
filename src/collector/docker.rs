use super::runtime::{
    ContainerRuntime, ContainerSummary, EventStream, LifecycleEvent, LogByteStream,
    LogStreamOptions, RuntimeError,
};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::models::{ContainerSummary as DockerContainerSummary, EventMessage};
use bollard::query_parameters::{EventsOptions, ListContainersOptions, LogsOptions};
use futures::StreamExt;

/// Seconds bollard waits on a single API call before giving up.
const DOCKER_TIMEOUT_SECS: u64 = 120;

/// `ContainerRuntime` backed by the Docker Engine API.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects with the platform defaults (`DOCKER_HOST` or the local socket).
    pub fn new() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_socket_defaults()?;
        Ok(Self { docker })
    }

    /// Connects to an explicit host: `tcp://`/`http://` addresses or a socket path.
    pub fn with_host(host: &str) -> Result<Self, RuntimeError> {
        let docker = if host.starts_with("tcp://") || host.starts_with("http://") {
            Docker::connect_with_http(host, DOCKER_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)?
        } else {
            let socket = host.trim_start_matches("unix://");
            Docker::connect_with_socket(socket, DOCKER_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)?
        };
        Ok(Self { docker })
    }

    pub fn connect(host: Option<&str>) -> Result<Self, RuntimeError> {
        match host {
            Some(host) => Self::with_host(host),
            None => Self::new(),
        }
    }

    fn container_to_summary(container: DockerContainerSummary) -> Option<ContainerSummary> {
        let name = container.names?.first()?.trim_start_matches('/').to_string();
        Some(ContainerSummary {
            id: container.id?,
            name,
        })
    }

    fn event_from_message(message: EventMessage) -> LifecycleEvent {
        LifecycleEvent {
            kind: message.typ.map(|t| t.to_string()).unwrap_or_default(),
            action: message.action.unwrap_or_default(),
            actor_id: message.actor.and_then(|a| a.id).unwrap_or_default(),
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        self.docker.ping().await?;
        Ok(())
    }

    async fn list_running_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let options = ListContainersOptions {
            all: false, // Only running containers
            ..Default::default()
        };

        let containers = self.docker.list_containers(Some(options)).await?;

        Ok(containers
            .into_iter()
            .filter_map(Self::container_to_summary)
            .collect())
    }

    fn lifecycle_events(&self) -> EventStream {
        self.docker
            .events(None::<EventsOptions>)
            .map(|event| {
                event
                    .map(Self::event_from_message)
                    .map_err(RuntimeError::from)
            })
            .boxed()
    }

    fn open_log_stream(&self, container_id: &str, options: &LogStreamOptions) -> LogByteStream {
        let log_options = LogsOptions {
            follow: options.follow,
            stdout: options.stdout,
            stderr: options.stderr,
            timestamps: options.timestamps,
            tail: options.tail_lines.to_string(),
            ..Default::default()
        };

        self.docker
            .logs(container_id, Some(log_options))
            .map(|chunk| {
                chunk
                    .map(LogOutput::into_bytes)
                    .map_err(RuntimeError::from)
            })
            .boxed()
    }
}

impl std::fmt::Debug for DockerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerRuntime")
            .field("docker", &"Docker { ... }")
            .finish()
    }
}
