use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

/// A fully normalized log record ready for batching and transmission.
///
/// Records are built once by the normalizer and then only moved: tailer to
/// buffer to dispatcher to sink. Fields are read through accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub(crate) timestamp: String,
    // Uppercase severity label; unknown labels are kept as written
    pub(crate) level: Option<String>,
    pub(crate) message: String,
    pub(crate) logger: Option<String>,
    pub(crate) trace_id: Option<String>,
    pub(crate) project_id: Option<String>,
    pub(crate) environment: Option<String>,

    // Container metadata
    pub(crate) container_id: String,
    pub(crate) container_name: String,
    pub(crate) service_name: String,

    pub(crate) exception_class: Option<String>,
    pub(crate) stack_trace: Option<String>,

    // Whole parsed object of a structured line, flattened on the wire
    pub(crate) extra: Option<Map<String, Value>>,
}

impl LogRecord {
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn level(&self) -> Option<&str> {
        self.level.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn logger(&self) -> Option<&str> {
        self.logger.as_deref()
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn exception_class(&self) -> Option<&str> {
        self.exception_class.as_deref()
    }

    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }

    pub fn extra(&self) -> Option<&Map<String, Value>> {
        self.extra.as_ref()
    }

    /// Named wire fields that are present on this record.
    fn named_fields(&self) -> Vec<(&'static str, Value)> {
        let mut fields = vec![("timestamp", Value::from(self.timestamp.as_str()))];
        if let Some(level) = &self.level {
            fields.push(("level", Value::from(level.as_str())));
        }
        fields.push(("message", Value::from(self.message.as_str())));

        let optional = [
            ("logger", &self.logger),
            ("traceId", &self.trace_id),
            ("projectId", &self.project_id),
            ("environment", &self.environment),
        ];
        fields.extend(
            optional
                .into_iter()
                .filter_map(|(key, value)| value.as_deref().map(|v| (key, Value::from(v)))),
        );

        fields.push(("containerId", Value::from(self.container_id.as_str())));
        fields.push(("containerName", Value::from(self.container_name.as_str())));
        fields.push(("serviceName", Value::from(self.service_name.as_str())));

        let trailing = [
            ("exceptionClass", &self.exception_class),
            ("stackTrace", &self.stack_trace),
        ];
        fields.extend(
            trailing
                .into_iter()
                .filter_map(|(key, value)| value.as_deref().map(|v| (key, Value::from(v)))),
        );
        fields
    }
}

// Named fields first, then extra keys that don't shadow a present named field.
impl Serialize for LogRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let named = self.named_fields();
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &named {
            map.serialize_entry(key, value)?;
        }
        if let Some(extra) = &self.extra {
            for (key, value) in extra {
                if named.iter().any(|(name, _)| *name == key.as_str()) {
                    continue;
                }
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}
