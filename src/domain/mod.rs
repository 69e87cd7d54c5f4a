//! Domain layer for loghealer-agent.
//!
//! Contains the canonical types shared across all modules:
//! - `LogRecord`: The pipeline's core data type
//! - `ContainerRef`: Identity of a tailed container
//! - `LogLevel`: Domain log severity (Error/Warn/Info/Debug/Trace)
//! - `AgentError`: Top-level startup error type

pub mod container;
pub mod error;
pub mod log_entry;
pub mod log_level;

pub use container::{ContainerRef, short_container_id};
pub use error::AgentError;
pub use log_entry::LogRecord;
pub use log_level::LogLevel;
