use super::discovery::{MonitoringFilter, find_running_container};
use super::runtime::{ContainerRuntime, ContainerSummary, LifecycleEvent, RuntimeError};
use super::tailer::StreamTailer;
use crate::domain::ContainerRef;
use futures::StreamExt;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// How the watcher resubscribes after the event feed drops.
///
/// `max_attempts == 0` keeps the single-subscription behavior: once the feed
/// ends no new containers are picked up, while running tailers carry on.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl ReconnectPolicy {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Exponential backoff capped at `max_delay`, optionally jittered by ±50%.
    pub fn delay(&self, attempt: u32) -> Duration {
        let multiplier = 2_u32.saturating_pow(attempt);
        let capped = self
            .base_delay
            .saturating_mul(multiplier)
            .min(self.max_delay);

        if self.jitter {
            let factor = rand::rng().random_range(0.5..1.5);
            capped.mul_f64(factor)
        } else {
            capped
        }
    }
}

/// Live tailer for one container id. `generation` tells a finishing tailer
/// whether it has already been replaced.
struct ActiveTailer {
    generation: u64,
    cancel: CancellationToken,
}

/// Whether a container that is already tailed keeps its tailer or gets a
/// fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Restart {
    Keep,
    Replace,
}

/// Finds containers to tail: everything running at startup, then every
/// container that starts afterwards. Each container id has at most one
/// live tailer.
pub struct ContainerWatcher {
    runtime: Arc<dyn ContainerRuntime>,
    filter: MonitoringFilter,
    tailer: StreamTailer,
    tracker: TaskTracker,
    active: Arc<Mutex<HashMap<String, ActiveTailer>>>,
    generations: AtomicU64,
    reconnect: ReconnectPolicy,
}

impl ContainerWatcher {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        filter: MonitoringFilter,
        tailer: StreamTailer,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            runtime,
            filter,
            tailer,
            tracker,
            active: Arc::new(Mutex::new(HashMap::new())),
            generations: AtomicU64::new(0),
            reconnect: ReconnectPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Initial scan, then the lifecycle event loop. Returns when `cancel`
    /// fires or the event feed is gone for good. Only a failed initial scan
    /// is reported as an error.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), RuntimeError> {
        let started = self.scan(&cancel).await?;
        info!("Initial scan started {} tailer(s)", started);

        let mut attempt = 0u32;
        let mut resubscribed = false;
        loop {
            let mut events = self.runtime.lifecycle_events();
            debug!("Subscribed to container lifecycle events");

            // Containers started while the feed was down never produced an
            // event we saw.
            if resubscribed {
                match self.scan(&cancel).await {
                    Ok(started) => info!("Rescan after resubscribe started {} tailer(s)", started),
                    Err(e) => warn!("Rescan after resubscribe failed: {}", e),
                }
            }

            let closed_by = loop {
                let next = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        info!("Container watcher stopping");
                        return Ok(());
                    }
                    next = events.next() => next,
                };

                match next {
                    Some(Ok(event)) => {
                        attempt = 0;
                        self.handle_event(&event, &cancel).await;
                    }
                    Some(Err(e)) => break e,
                    None => break RuntimeError::EventStreamClosed,
                }
            };

            if attempt >= self.reconnect.max_attempts {
                error!(
                    "Container event subscription ended: {}; new containers will not be tailed",
                    closed_by
                );
                return Ok(());
            }

            let delay = self.reconnect.delay(attempt);
            attempt += 1;
            warn!(
                "Container event subscription ended: {}; resubscribing in {:?} (attempt {}/{})",
                closed_by, delay, attempt, self.reconnect.max_attempts
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(delay) => {}
            }
            resubscribed = true;
        }
    }

    /// Spawns a tailer for every running container that passes the filter
    /// and is not tailed yet.
    pub async fn scan(&self, cancel: &CancellationToken) -> Result<usize, RuntimeError> {
        let containers = self.runtime.list_running_containers().await?;
        debug!("Found {} running container(s)", containers.len());

        Ok(containers
            .into_iter()
            .filter(|c| self.spawn_tailer(c, cancel, Restart::Keep))
            .count())
    }

    async fn handle_event(&self, event: &LifecycleEvent, cancel: &CancellationToken) {
        if !event.is_container_start() {
            return;
        }

        match find_running_container(self.runtime.as_ref(), &event.actor_id).await {
            // A restarted container may still have its previous tailer
            // waiting on a stream that never ends.
            Ok(Some(container)) => {
                self.spawn_tailer(&container, cancel, Restart::Replace);
            }
            Ok(None) => debug!(
                "Started container {} is no longer running",
                event.actor_id
            ),
            Err(e) => warn!(
                "Failed to resolve started container {}: {}",
                event.actor_id, e
            ),
        }
    }

    /// Starts a tailer unless the container is filtered out. An existing
    /// tailer for the same id is kept or cancelled according to `restart`.
    /// Returns whether a tailer was spawned.
    fn spawn_tailer(
        &self,
        container: &ContainerSummary,
        cancel: &CancellationToken,
        restart: Restart,
    ) -> bool {
        if !self.filter.should_monitor(&container.name) {
            debug!("Skipping excluded container {}", container.name);
            return false;
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let token = cancel.child_token();
        {
            let mut active = self.active.lock();
            if let Some(previous) = active.get(&container.id) {
                if restart == Restart::Keep {
                    debug!("Container {} is already being tailed", container.name);
                    return false;
                }
                info!("Container {} restarted; replacing its tailer", container.name);
                previous.cancel.cancel();
            }
            active.insert(
                container.id.clone(),
                ActiveTailer {
                    generation,
                    cancel: token.clone(),
                },
            );
        }

        let tailer = self.tailer.clone();
        let active = Arc::clone(&self.active);
        let source = ContainerRef::new(container.id.clone(), &container.name);

        self.tracker.spawn(async move {
            let id = source.id.clone();
            tailer.tail(source, token).await;

            let mut active = active.lock();
            if active.get(&id).is_some_and(|t| t.generation == generation) {
                active.remove(&id);
            }
        });

        true
    }
}

impl std::fmt::Debug for ContainerWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerWatcher")
            .field("filter", &self.filter)
            .field("active", &self.active.lock().len())
            .field("reconnect", &self.reconnect)
            .finish_non_exhaustive()
    }
}
