/// Identity of a tailed container, fixed when tailing starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    pub id: String,
    pub name: String,
}

impl ContainerRef {
    /// Builds a reference from a runtime name, dropping the leading `/`
    /// Docker puts on container names.
    pub fn new(id: impl Into<String>, name: impl AsRef<str>) -> Self {
        Self {
            id: id.into(),
            name: name.as_ref().trim_start_matches('/').to_string(),
        }
    }

    /// Short id used in records and log lines.
    pub fn short_id(&self) -> &str {
        short_container_id(&self.id)
    }
}

/// Number of leading id characters kept in records.
pub const SHORT_ID_LEN: usize = 12;

pub fn short_container_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
