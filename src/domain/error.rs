use thiserror::Error;

/// Top-level error type for the agent.
///
/// Only startup failures surface through this type. Everything that goes
/// wrong once the pipeline is running is logged where it happens.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::app::ConfigError),

    #[error("Container runtime error: {0}")]
    Runtime(#[from] crate::collector::RuntimeError),

    #[error("Delivery setup error: {0}")]
    Delivery(#[from] crate::sender::DeliveryError),

    #[error("Logging setup error: {0}")]
    Logging(#[from] crate::app::LoggingError),
}
