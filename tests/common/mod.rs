#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};
use loghealer_agent::buffer::Batch;
use loghealer_agent::collector::{
    ContainerRuntime, ContainerSummary, EventStream, LifecycleEvent, LogByteStream,
    LogStreamOptions, RuntimeError,
};
use loghealer_agent::sender::{DeliveryError, DeliveryReceipt, LogSink};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// In-memory container runtime. Log streams replay their scripted chunks and
/// then stay open like a followed stream.
///
/// The first event subscription reads from the sender returned by `new`.
/// Every later subscription gets its own channel, fed by `emit` and closed
/// by `end_subscriptions`.
#[derive(Default)]
pub struct FakeRuntime {
    containers: Mutex<Vec<ContainerSummary>>,
    logs: Mutex<HashMap<String, Vec<&'static str>>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<LifecycleEvent>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<LifecycleEvent>>>,
    subscriptions: AtomicUsize,
    opened: Mutex<Vec<String>>,
    replayed: Arc<AtomicUsize>,
    fail_list: AtomicBool,
    fail_ping: AtomicBool,
}

impl FakeRuntime {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<LifecycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let runtime = Self {
            events: Mutex::new(Some(rx)),
            ..Default::default()
        };
        (Arc::new(runtime), tx)
    }

    pub fn add_container(&self, id: &str, name: &str, chunks: Vec<&'static str>) {
        self.containers.lock().push(ContainerSummary {
            id: id.to_string(),
            name: name.to_string(),
        });
        self.logs.lock().insert(id.to_string(), chunks);
    }

    pub fn fail_listing(&self) {
        self.fail_list.store(true, Ordering::SeqCst);
    }

    pub fn fail_ping(&self) {
        self.fail_ping.store(true, Ordering::SeqCst);
    }

    /// Number of times the event feed was subscribed to.
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// Sends an event to every resubscribed feed.
    pub fn emit(&self, event: LifecycleEvent) {
        for tx in self.subscribers.lock().iter() {
            let _ = tx.send(event.clone());
        }
    }

    /// Ends every resubscribed feed.
    pub fn end_subscriptions(&self) {
        self.subscribers.lock().clear();
    }

    /// Container ids in the order their log streams were opened.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }

    /// Streams whose scripted chunks have all been consumed by a reader.
    pub fn replayed(&self) -> usize {
        self.replayed.load(Ordering::SeqCst)
    }
}

pub fn start_event(id: &str) -> LifecycleEvent {
    LifecycleEvent {
        kind: "container".to_string(),
        action: "start".to_string(),
        actor_id: id.to_string(),
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(RuntimeError::Unavailable("daemon not reachable".to_string()));
        }
        Ok(())
    }

    async fn list_running_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(RuntimeError::Unavailable("list failed".to_string()));
        }
        Ok(self.containers.lock().clone())
    }

    fn lifecycle_events(&self) -> EventStream {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let rx = self.events.lock().take().unwrap_or_else(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            self.subscribers.lock().push(tx);
            rx
        });
        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (Ok(event), rx))
        })
        .boxed()
    }

    fn open_log_stream(&self, container_id: &str, _options: &LogStreamOptions) -> LogByteStream {
        self.opened.lock().push(container_id.to_string());

        let chunks: Vec<Result<Bytes, RuntimeError>> = self
            .logs
            .lock()
            .get(container_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
            .collect();

        let replayed = Arc::clone(&self.replayed);
        let marker = stream::once(async move {
            replayed.fetch_add(1, Ordering::SeqCst);
        })
        .filter_map(|()| async { None::<Result<Bytes, RuntimeError>> });

        stream::iter(chunks)
            .chain(marker)
            .chain(stream::pending())
            .boxed()
    }
}

/// Sink that keeps every batch it is handed.
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Batch>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn batches(&self) -> Vec<Batch> {
        self.batches.lock().clone()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn messages(&self) -> Vec<String> {
        self.batches
            .lock()
            .iter()
            .flat_map(|b| b.entries().iter().map(|r| r.message().to_string()))
            .collect()
    }
}

#[async_trait]
impl LogSink for RecordingSink {
    async fn deliver(&self, batch: Batch) -> Result<DeliveryReceipt, DeliveryError> {
        let records = batch.size();
        self.batches.lock().push(batch);
        Ok(DeliveryReceipt {
            status_code: 202,
            records,
            bytes_sent: 0,
            latency: Duration::ZERO,
        })
    }
}

/// Polls `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
