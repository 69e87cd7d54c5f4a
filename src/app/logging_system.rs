use super::config::{LogFormat, LogLevel};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Chatty HTTP internals are held at WARN regardless of the agent's level.
const DEFAULT_DIRECTIVES: [&str; 5] = [
    "hyper=warn",
    "hyper_util=warn",
    "reqwest=warn",
    "h2=warn",
    "rustls=warn",
];

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {details}")]
    InvalidFilter { filter: String, details: String },
    #[error("Failed to install tracing subscriber: {0}")]
    InstallFailed(String),
}

fn level_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

/// Builds the filter: default level first, then the library directives, then
/// any `RUST_LOG` override so it wins on conflicts.
pub fn build_filter_string(level: LogLevel, overrides: Option<&str>) -> String {
    let mut parts = Vec::with_capacity(DEFAULT_DIRECTIVES.len() + 2);
    parts.push(level_str(level).to_string());
    parts.extend(DEFAULT_DIRECTIVES.iter().map(ToString::to_string));

    if let Some(extra) = overrides.map(str::trim).filter(|s| !s.is_empty()) {
        parts.push(extra.to_string());
    }

    parts.join(",")
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(level: LogLevel, format: LogFormat) -> Result<(), LoggingError> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = build_filter_string(level, rust_log.as_deref());

    let env_filter = EnvFilter::try_new(&filter).map_err(|e| LoggingError::InvalidFilter {
        filter: filter.clone(),
        details: e.to_string(),
    })?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_level(true).compact())
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(false)
                    .flatten_event(true),
            )
            .try_init(),
    };

    result.map_err(|e| LoggingError::InstallFailed(e.to_string()))
}
