use crate::domain::{ContainerRef, LogLevel, LogRecord, short_container_id};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Turns raw container log lines into `LogRecord`s.
///
/// Stateless apart from the pipeline-wide default project id, so a single
/// instance is shared by every tailer.
#[derive(Debug, Clone, Default)]
pub struct LineNormalizer {
    default_project_id: String,
}

impl LineNormalizer {
    pub fn new(default_project_id: impl Into<String>) -> Self {
        Self {
            default_project_id: default_project_id.into(),
        }
    }

    pub fn default_project_id(&self) -> &str {
        &self.default_project_id
    }

    pub fn normalize(&self, line: &str, source: &ContainerRef) -> LogRecord {
        normalize(line, source, &self.default_project_id)
    }
}

/// Normalizes one line. JSON objects are read as structured entries,
/// anything else is kept verbatim as the message.
pub fn normalize(line: &str, source: &ContainerRef, default_project_id: &str) -> LogRecord {
    let mut record = match serde_json::from_str::<Map<String, Value>>(line) {
        Ok(object) => structured_record(line, object),
        Err(_) => plain_record(line),
    };

    record.container_id = short_container_id(&source.id).to_string();
    record.container_name = source.name.clone();
    record.service_name = service_name(&source.name).to_string();

    if record.project_id.as_deref().is_none_or(str::is_empty) {
        record.project_id = Some(default_project_id.to_string()).filter(|p| !p.is_empty());
    }

    record
}

/// Compose-style names are `<project>-<service>-<replica>`; the service is the
/// second-to-last segment. Names without a hyphen are used whole.
pub fn service_name(container_name: &str) -> &str {
    let parts: Vec<&str> = container_name.split('-').collect();
    if parts.len() >= 2 {
        parts[parts.len() - 2]
    } else {
        container_name
    }
}

fn structured_record(line: &str, object: Map<String, Value>) -> LogRecord {
    let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);

    let timestamp = text("timestamp")
        .or_else(|| text("@timestamp"))
        .unwrap_or_else(now_rfc3339);

    // A non-text level is ignored rather than defaulted
    let level = object
        .get("level")
        .and_then(Value::as_str)
        .map(LogLevel::canonical_label);

    LogRecord {
        timestamp,
        level,
        message: text("message").unwrap_or_else(|| line.to_string()),
        logger: text("logger"),
        trace_id: text("traceId"),
        project_id: text("projectId"),
        environment: text("environment"),
        container_id: String::new(),
        container_name: String::new(),
        service_name: String::new(),
        exception_class: text("exceptionClass"),
        stack_trace: text("stackTrace"),
        extra: Some(object),
    }
}

fn plain_record(line: &str) -> LogRecord {
    LogRecord {
        timestamp: now_rfc3339(),
        level: Some(LogLevel::detect(line).to_string()),
        message: line.to_string(),
        logger: None,
        trace_id: None,
        project_id: None,
        environment: None,
        container_id: String::new(),
        container_name: String::new(),
        service_name: String::new(),
        exception_class: None,
        stack_trace: None,
        extra: None,
    }
}

/// Current time in UTC, RFC 3339 with nanoseconds.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}
