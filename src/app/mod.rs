pub mod config;
pub mod logging_system;
pub mod pipeline;
pub mod shutdown;

pub use config::{ApiKey, Config, ConfigError, LogFormat, LogLevel};
pub use logging_system::{LoggingError, build_filter_string, init_logging};
pub use pipeline::{Pipeline, PipelineSettings};
pub use shutdown::{cancel_on_signal, wait_for_signal};

use crate::buffer::MetricsSnapshot;
use crate::collector::{ContainerRuntime, DockerRuntime};
use crate::domain::AgentError;
use crate::sender::{HttpSink, LogSink};
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct App {
    config: Config,
    runtime: Arc<dyn ContainerRuntime>,
    sink: Arc<dyn LogSink>,
}

impl App {
    /// Connects to Docker and builds the HTTP sink described by `config`.
    pub fn from_config(config: Config) -> Result<Self, AgentError> {
        let runtime = DockerRuntime::connect(config.docker_host.as_deref())?;
        let sink = HttpSink::new(config.sink_config())?;
        Ok(Self::with_components(config, Arc::new(runtime), Arc::new(sink)))
    }

    pub fn with_components(
        config: Config,
        runtime: Arc<dyn ContainerRuntime>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            config,
            runtime,
            sink,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs until SIGINT/SIGTERM.
    pub async fn run(self) -> Result<MetricsSnapshot, AgentError> {
        let cancel = CancellationToken::new();
        tokio::spawn(cancel_on_signal(cancel.clone()));
        self.run_until(cancel).await
    }

    /// Runs until `cancel` fires. The runtime must answer a ping first.
    pub async fn run_until(self, cancel: CancellationToken) -> Result<MetricsSnapshot, AgentError> {
        self.runtime.ping().await?;
        info!("Connected to container runtime");

        let settings = PipelineSettings::from(&self.config);
        let pipeline = Pipeline::new(self.runtime, self.sink, settings);
        Ok(pipeline.run(cancel).await?)
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn log_startup(config: &Config) {
    info!("Starting loghealer-agent v{}", crate::VERSION);
    info!(
        "Configuration: endpoint={}, batch_size={}, flush_interval={:?}, project_id={:?}",
        config.endpoint,
        config.batch_size,
        config.flush_interval,
        config.project_id.as_deref().unwrap_or("")
    );
    info!(
        "Excluding containers matching: {:?}",
        config.monitoring_filter().excluded()
    );
}

// Main entry point for the application
pub async fn main() -> anyhow::Result<()> {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            // Configured logging isn't known yet; report with the defaults.
            let _ = init_logging(LogLevel::Info, LogFormat::Text);
            error!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    init_logging(config.log_level, config.log_format)?;
    log_startup(&config);

    let app = match App::from_config(config) {
        Ok(app) => app,
        Err(e) => {
            error!("Startup failed: {}", e);
            process::exit(1);
        }
    };

    match app.run().await {
        Ok(_) => {
            info!("loghealer-agent stopped.");
            Ok(())
        }
        Err(e) => {
            error!("Application error: {}", e);
            process::exit(1);
        }
    }
}
