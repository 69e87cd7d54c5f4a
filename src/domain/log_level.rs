use serde::{Deserialize, Serialize};

/// Domain log level representing the severity of a log entry.
///
/// This is distinct from the `LogLevel` in `app::config` (used for configuring
/// the agent's own tracing output). This one is parsed from application logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Keyword search order for free-text lines. First hit wins.
    pub const PRIORITY: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    /// Maps a level label from a structured entry. Case-insensitive.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_uppercase().as_str() {
            "ERROR" => Some(LogLevel::Error),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "INFO" => Some(LogLevel::Info),
            "DEBUG" => Some(LogLevel::Debug),
            "TRACE" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    /// Wire label for a structured entry's level: known labels in their
    /// canonical spelling, anything else uppercased as-is.
    pub fn canonical_label(label: &str) -> String {
        Self::from_label(label)
            .map_or_else(|| label.to_uppercase(), |level| level.as_str().to_string())
    }

    /// Scans a free-text line for the first level keyword in priority order,
    /// defaulting to `Info`.
    pub fn detect(line: &str) -> Self {
        let upper = line.to_uppercase();
        Self::PRIORITY
            .into_iter()
            .find(|level| upper.contains(level.as_str()))
            .unwrap_or(LogLevel::Info)
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
