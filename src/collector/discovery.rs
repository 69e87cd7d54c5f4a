use super::runtime::{ContainerRuntime, ContainerSummary, RuntimeError};

/// Name fragments that are never tailed: the agent itself and
/// infrastructure services that aren't application workloads.
pub const DEFAULT_EXCLUDED_NAMES: [&str; 5] = [
    "loghealer-agent",
    "postgres",
    "redis",
    "elasticsearch",
    "caddy",
];

/// Denylist deciding which containers get tailed.
///
/// A container is monitored unless its name contains one of the fragments.
/// Matching is case-sensitive and ignores a leading `/`.
#[derive(Debug, Clone)]
pub struct MonitoringFilter {
    excluded: Vec<String>,
}

impl Default for MonitoringFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_NAMES)
    }
}

impl MonitoringFilter {
    pub fn new<I, S>(excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: excluded
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    pub fn should_monitor(&self, container_name: &str) -> bool {
        let name = container_name.trim_start_matches('/');
        !self.excluded.iter().any(|fragment| name.contains(fragment.as_str()))
    }

    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }
}

/// Looks up a running container by id. Used to resolve the name behind a
/// start event.
pub async fn find_running_container<R>(
    runtime: &R,
    container_id: &str,
) -> Result<Option<ContainerSummary>, RuntimeError>
where
    R: ContainerRuntime + ?Sized,
{
    let containers = runtime.list_running_containers().await?;
    Ok(containers.into_iter().find(|c| c.id == container_id))
}
