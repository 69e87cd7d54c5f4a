mod common;

use common::{FakeRuntime, RecordingSink, start_event, wait_until};
use loghealer_agent::app::{ApiKey, App, Config, Pipeline, PipelineSettings};
use loghealer_agent::buffer::FlushTrigger;
use loghealer_agent::collector::{LifecycleEvent, ReconnectPolicy};
use loghealer_agent::domain::AgentError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn settings(batch_size: usize, flush_interval: Duration) -> PipelineSettings {
    PipelineSettings {
        batch_size,
        flush_interval,
        default_project_id: "proj-42".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_size_trigger_delivers_full_batch_in_order() {
    let (runtime, _events) = FakeRuntime::new();
    runtime.add_container("aaaaaaaaaaaaaaaa", "shop-api-1", vec!["one\ntwo\n", "three\n"]);
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();

    let pipeline = Pipeline::new(
        runtime.clone(),
        sink.clone(),
        settings(3, Duration::from_secs(3600)),
    );
    let handle = tokio::spawn(pipeline.run(cancel.clone()));

    wait_until(|| sink.batch_count() >= 1).await;
    let batch = &sink.batches()[0];
    assert_eq!(batch.trigger(), FlushTrigger::SizeBased);
    let messages: Vec<_> = batch.entries().iter().map(|r| r.message()).collect();
    assert_eq!(messages, ["one", "two", "three"]);
    assert_eq!(batch.entries()[0].project_id(), Some("proj-42"));
    assert_eq!(batch.entries()[0].service_name(), "api");

    cancel.cancel();
    let snapshot = handle.await.unwrap().unwrap();
    assert_eq!(snapshot.records_delivered, 3);
    assert_eq!(sink.batch_count(), 1, "nothing left for the shutdown flush");
}

#[tokio::test]
async fn test_shutdown_drains_residual_records_as_one_batch() {
    let (runtime, _events) = FakeRuntime::new();
    runtime.add_container("bbbbbbbbbbbbbbbb", "shop-worker-1", vec!["first\n", "second\n"]);
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();

    let pipeline = Pipeline::new(
        runtime.clone(),
        sink.clone(),
        settings(10, Duration::from_secs(3600)),
    );
    let handle = tokio::spawn(pipeline.run(cancel.clone()));

    wait_until(|| runtime.replayed() == 1).await;
    assert_eq!(sink.batch_count(), 0);

    cancel.cancel();
    let snapshot = handle.await.unwrap().unwrap();

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].trigger(), FlushTrigger::Shutdown);
    assert_eq!(batches[0].size(), 2);
    assert_eq!(snapshot.records_appended, 2);
    assert_eq!(snapshot.batches_delivered, 1);
}

#[tokio::test(start_paused = true)]
async fn test_idle_ticks_send_nothing() {
    let (runtime, _events) = FakeRuntime::new();
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();

    let pipeline = Pipeline::new(runtime, sink.clone(), settings(5, Duration::from_secs(1)));
    let handle = tokio::spawn(pipeline.run(cancel.clone()));

    tokio::time::sleep(Duration::from_secs(5)).await;
    cancel.cancel();
    let snapshot = handle.await.unwrap().unwrap();

    assert_eq!(sink.batch_count(), 0);
    assert_eq!(snapshot.flushes, 0);
}

#[tokio::test]
async fn test_interval_flushes_partial_batch() {
    let (runtime, _events) = FakeRuntime::new();
    runtime.add_container("cccccccccccccccc", "shop-api-1", vec!["lonely\n"]);
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();

    let pipeline = Pipeline::new(
        runtime.clone(),
        sink.clone(),
        settings(100, Duration::from_millis(50)),
    );
    let handle = tokio::spawn(pipeline.run(cancel.clone()));

    wait_until(|| sink.batch_count() == 1).await;
    assert_eq!(sink.batches()[0].trigger(), FlushTrigger::TimeBased);
    assert_eq!(sink.messages(), ["lonely"]);

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_filter_and_duplicate_start_events() {
    let (runtime, events) = FakeRuntime::new();
    runtime.add_container("aaaaaaaaaaaaaaaa", "shop-api-1", vec!["api up\n"]);
    runtime.add_container("dddddddddddddddd", "shop-postgres-1", vec!["db up\n"]);
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();

    let pipeline = Pipeline::new(
        runtime.clone(),
        sink.clone(),
        settings(100, Duration::from_secs(3600)),
    );
    let handle = tokio::spawn(pipeline.run(cancel.clone()));

    wait_until(|| runtime.opened().len() == 1).await;

    // Excluded, not a container, then a genuinely new one.
    events.send(start_event("dddddddddddddddd")).unwrap();
    events
        .send(LifecycleEvent {
            kind: "network".to_string(),
            action: "start".to_string(),
            actor_id: "nnnnnnnnnnnnnnnn".to_string(),
        })
        .unwrap();
    runtime.add_container("eeeeeeeeeeeeeeee", "shop-worker-1", vec!["worker up\n"]);
    events.send(start_event("eeeeeeeeeeeeeeee")).unwrap();

    wait_until(|| runtime.replayed() == 2).await;
    assert_eq!(runtime.opened(), ["aaaaaaaaaaaaaaaa", "eeeeeeeeeeeeeeee"]);

    cancel.cancel();
    handle.await.unwrap().unwrap();

    let mut messages = sink.messages();
    messages.sort();
    assert_eq!(messages, ["api up", "worker up"]);
}

#[tokio::test]
async fn test_start_event_for_tailed_container_replaces_tailer() {
    let (runtime, events) = FakeRuntime::new();
    runtime.add_container("aaaaaaaaaaaaaaaa", "shop-api-1", vec!["booted\n"]);
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();

    let pipeline = Pipeline::new(
        runtime.clone(),
        sink.clone(),
        settings(100, Duration::from_secs(3600)),
    );
    let handle = tokio::spawn(pipeline.run(cancel.clone()));

    wait_until(|| runtime.replayed() == 1).await;

    // Restarted while the first stream is still open.
    events.send(start_event("aaaaaaaaaaaaaaaa")).unwrap();
    wait_until(|| runtime.replayed() == 2).await;
    assert_eq!(runtime.opened(), ["aaaaaaaaaaaaaaaa", "aaaaaaaaaaaaaaaa"]);

    cancel.cancel();
    handle.await.unwrap().unwrap();
    assert_eq!(sink.messages(), ["booted", "booted"]);
}

#[tokio::test(start_paused = true)]
async fn test_resubscribe_rescans_without_duplicate_tailers() {
    let (runtime, events) = FakeRuntime::new();
    runtime.add_container("aaaaaaaaaaaaaaaa", "shop-api-1", vec!["api up\n"]);
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();

    let pipeline = Pipeline::new(
        runtime.clone(),
        sink.clone(),
        PipelineSettings {
            reconnect: ReconnectPolicy::with_max_attempts(1),
            ..settings(100, Duration::from_secs(3600))
        },
    );
    let handle = tokio::spawn(pipeline.run(cancel.clone()));

    wait_until(|| runtime.replayed() == 1).await;

    // Started while the feed is down, so only the rescan can find it.
    runtime.add_container("bbbbbbbbbbbbbbbb", "shop-worker-1", vec!["worker up\n"]);
    drop(events);

    wait_until(|| runtime.replayed() == 2).await;
    assert_eq!(runtime.subscriptions(), 2);
    assert_eq!(runtime.opened(), ["aaaaaaaaaaaaaaaa", "bbbbbbbbbbbbbbbb"]);

    // An event on the new feed restores the attempt budget.
    runtime.add_container("cccccccccccccccc", "shop-mailer-1", vec!["mailer up\n"]);
    runtime.emit(start_event("cccccccccccccccc"));
    wait_until(|| runtime.replayed() == 3).await;

    runtime.end_subscriptions();
    wait_until(|| runtime.subscriptions() == 3).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        runtime.opened(),
        ["aaaaaaaaaaaaaaaa", "bbbbbbbbbbbbbbbb", "cccccccccccccccc"]
    );

    cancel.cancel();
    handle.await.unwrap().unwrap();

    let mut messages = sink.messages();
    messages.sort();
    assert_eq!(messages, ["api up", "mailer up", "worker up"]);
}

#[tokio::test]
async fn test_event_stream_end_keeps_tailers_running() {
    let (runtime, events) = FakeRuntime::new();
    runtime.add_container("aaaaaaaaaaaaaaaa", "shop-api-1", vec!["still here\n"]);
    let sink = RecordingSink::new();
    let cancel = CancellationToken::new();

    let pipeline = Pipeline::new(
        runtime.clone(),
        sink.clone(),
        settings(100, Duration::from_secs(3600)),
    );
    let handle = tokio::spawn(pipeline.run(cancel.clone()));

    wait_until(|| runtime.replayed() == 1).await;
    drop(events);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished(), "pipeline waits for shutdown");

    cancel.cancel();
    handle.await.unwrap().unwrap();
    assert_eq!(sink.messages(), ["still here"]);
}

#[tokio::test]
async fn test_initial_listing_failure_is_fatal() {
    let (runtime, _events) = FakeRuntime::new();
    runtime.fail_listing();
    let sink = RecordingSink::new();

    let pipeline = Pipeline::new(runtime, sink.clone(), PipelineSettings::default());
    let result = pipeline.run(CancellationToken::new()).await;

    assert!(result.is_err());
    assert_eq!(sink.batch_count(), 0);
}

#[tokio::test]
async fn test_app_fails_when_runtime_unreachable() {
    let (runtime, _events) = FakeRuntime::new();
    runtime.fail_ping();
    let config = Config {
        api_key: Some(ApiKey::new("k")),
        ..Config::default()
    };

    let app = App::with_components(config, runtime, RecordingSink::new());
    let result = app.run_until(CancellationToken::new()).await;

    assert!(matches!(result, Err(AgentError::Runtime(_))));
}

#[tokio::test]
async fn test_app_runs_pipeline_until_cancelled() {
    let (runtime, _events) = FakeRuntime::new();
    runtime.add_container("ffffffffffffffff", "billing-api-1", vec![
        "{\"level\":\"error\",\"message\":\"card declined\",\"orderId\":7}\n",
    ]);
    let sink = RecordingSink::new();
    let config = Config {
        api_key: Some(ApiKey::new("k")),
        project_id: Some("billing".to_string()),
        ..Config::default()
    };
    let cancel = CancellationToken::new();

    let app = App::with_components(config, runtime.clone(), sink.clone());
    let handle = tokio::spawn(app.run_until(cancel.clone()));

    wait_until(|| runtime.replayed() == 1).await;
    cancel.cancel();
    handle.await.unwrap().unwrap();

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    let record = &batches[0].entries()[0];
    assert_eq!(record.message(), "card declined");
    assert_eq!(record.project_id(), Some("billing"));
    assert_eq!(record.extra().unwrap()["orderId"], 7);
}
