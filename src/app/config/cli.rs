use super::{ApiKey, ConfigError, LogFormat, LogLevel};
use crate::collector::{DEFAULT_EXCLUDED_NAMES, LogStreamOptions, MonitoringFilter, ReconnectPolicy};
use crate::sender::HttpSinkConfig;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "http://localhost:8080/api/v1";

#[derive(Parser, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[command(author, version, about = "Tails container logs and ships them to a LogHealer collector", long_about = None)]
#[serde(default)]
pub struct Config {
    /// Collector base URL; batches go to <endpoint>/logs/batch
    #[arg(long, env = "LOGHEALER_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Shared secret sent as X-API-Key (required)
    #[arg(long, env = "LOGHEALER_API_KEY", hide_env_values = true)]
    #[serde(skip_serializing)]
    pub api_key: Option<ApiKey>,

    /// Project id stamped on records that don't carry one
    #[arg(long, env = "LOGHEALER_PROJECT_ID")]
    pub project_id: Option<String>,

    /// Number of records that triggers a flush
    #[arg(long, env = "LOGHEALER_BATCH_SIZE", default_value = "50")]
    pub batch_size: usize,

    /// Flush interval in milliseconds
    #[arg(long, env = "LOGHEALER_FLUSH_INTERVAL_MS", default_value = "5000")]
    pub flush_interval_ms: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "LOGHEALER_REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    /// Historical lines replayed when a tailer attaches
    #[arg(long, env = "LOGHEALER_TAIL_LINES", default_value = "100")]
    pub tail_lines: usize,

    /// Comma-separated container name fragments to skip (replaces the built-in list)
    #[arg(long, env = "LOGHEALER_EXCLUDE", value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// Resubscribe attempts after the Docker event stream drops (0 = never)
    #[arg(long, env = "LOGHEALER_EVENT_RECONNECT_ATTEMPTS", default_value = "0")]
    pub event_reconnect_attempts: u32,

    /// Docker daemon address (unix socket path or tcp://host:port)
    #[arg(long, env = "DOCKER_HOST")]
    pub docker_host: Option<String>,

    /// Log level
    #[arg(long, env = "LOGHEALER_LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, env = "LOGHEALER_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    /// Configuration file path (optional, TOML)
    #[arg(long, env = "LOGHEALER_CONFIG_FILE")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    /// Derived fields (not CLI arguments)
    #[serde(skip)]
    #[arg(skip)]
    pub flush_interval: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            project_id: None,
            batch_size: 50,
            flush_interval_ms: 5000,
            request_timeout_secs: 30,
            tail_lines: 100,
            exclude: None,
            event_reconnect_attempts: 0,
            docker_host: None,
            log_level: LogLevel::Info,
            log_format: LogFormat::Text,
            config_file: None,
            flush_interval: Duration::from_millis(5000),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Takes the file's value for every field the command line and environment
/// left at its default.
macro_rules! merge_from_file {
    ($config:ident, $file:ident, $defaults:ident, [$($field:ident),+ $(,)?]) => {
        $(
            if $config.$field == $defaults.$field {
                $config.$field = $file.$field;
            }
        )+
    };
}

impl Config {
    /// Command line, then environment, then the optional config file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(std::env::args_os())
    }

    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut config = Config::parse_from(args);

        if let Some(path) = config.config_file.clone() {
            let file = Self::read_file(&path)?;
            config.merge_file(file);
        }

        config.post_process();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path.as_ref())?;
        config.post_process();
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    fn merge_file(&mut self, file: Config) {
        let defaults = Config::default();
        merge_from_file!(
            self,
            file,
            defaults,
            [
                endpoint,
                api_key,
                project_id,
                batch_size,
                flush_interval_ms,
                request_timeout_secs,
                tail_lines,
                exclude,
                event_reconnect_attempts,
                docker_host,
                log_level,
                log_format,
            ]
        );
    }

    pub fn post_process(&mut self) {
        self.flush_interval = Duration::from_millis(self.flush_interval_ms);
        self.request_timeout = Duration::from_secs(self.request_timeout_secs);
    }

    pub fn default_project_id(&self) -> &str {
        self.project_id.as_deref().unwrap_or_default()
    }

    pub fn monitoring_filter(&self) -> MonitoringFilter {
        match &self.exclude {
            Some(fragments) => MonitoringFilter::new(fragments.iter().map(|s| s.trim().to_string())),
            None => MonitoringFilter::new(DEFAULT_EXCLUDED_NAMES),
        }
    }

    pub fn log_stream_options(&self) -> LogStreamOptions {
        LogStreamOptions {
            tail_lines: self.tail_lines,
            ..Default::default()
        }
    }

    pub fn sink_config(&self) -> HttpSinkConfig {
        HttpSinkConfig {
            endpoint: self.endpoint.clone(),
            api_key: self
                .api_key
                .as_ref()
                .map(|key| key.expose().to_string())
                .unwrap_or_default(),
            timeout: self.request_timeout,
            ..Default::default()
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::with_max_attempts(self.event_reconnect_attempts)
    }
}
