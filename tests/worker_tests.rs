// End-to-end worker behavior on a canned registry: cadence, failure
// isolation, delta series publication, and shutdown.

mod common;

use device_telemetry::error::SourceQueryError;
use device_telemetry::source::QueryRegistry;
use device_telemetry::spec::MetricSpec;
use device_telemetry::store::{SnapshotStore, delta_key};
use device_telemetry::worker::{WorkerDeps, spawn_delta_worker, spawn_metric_worker};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::time::Duration;

fn deps_for(
    registry: QueryRegistry,
) -> (WorkerDeps, Arc<SnapshotStore>, watch::Sender<bool>) {
    let store = Arc::new(SnapshotStore::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let deps = WorkerDeps {
        registry: Arc::new(registry),
        store: store.clone(),
        samples_total: Arc::new(AtomicU64::new(0)),
        shutdown_rx,
    };
    (deps, store, shutdown_tx)
}

fn memory_spec() -> MetricSpec {
    MetricSpec {
        model_key: "memory".into(),
        primary_source: Some("memory_info".into()),
        attributes: vec!["total".into(), "percent".into()],
        background_enabled: true,
        sample_interval_secs: 1,
        ..MetricSpec::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn metric_worker_samples_on_its_cadence_and_stops_on_shutdown() {
    let (deps, store, shutdown_tx) = deps_for(common::canned_registry());
    let samples_total = deps.samples_total.clone();

    let handle = spawn_metric_worker(memory_spec(), deps);
    tokio::time::sleep(Duration::from_millis(1300)).await;

    // First tick fires immediately, then once per second.
    let taken = samples_total.load(Ordering::Relaxed);
    assert!((1..=3).contains(&taken), "expected 1..=3 samples, got {taken}");
    let entry = store.read("memory").unwrap();
    assert_eq!(entry.value, json!({"total": 1024, "percent": 50.0}));

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("worker did not stop after shutdown")
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_query_skips_ticks_but_keeps_the_worker_alive() {
    let calls = Arc::new(AtomicU64::new(0));
    let calls_in_query = calls.clone();
    let mut registry = QueryRegistry::new();
    registry.register("always_fails", move |_args| {
        calls_in_query.fetch_add(1, Ordering::SeqCst);
        Err(SourceQueryError::new("always_fails", "sensor unplugged"))
    });
    let (deps, store, shutdown_tx) = deps_for(registry);
    let samples_total = deps.samples_total.clone();

    let spec = MetricSpec {
        model_key: "doomed".into(),
        primary_source: Some("always_fails".into()),
        attributes: vec!["anything".into()],
        background_enabled: true,
        sample_interval_secs: 1,
        ..MetricSpec::default()
    };
    let handle = spawn_metric_worker(spec, deps);
    tokio::time::sleep(Duration::from_millis(2300)).await;

    // Still retrying every interval despite the failures.
    assert!(calls.load(Ordering::SeqCst) >= 2);
    assert_eq!(samples_total.load(Ordering::Relaxed), 0);
    assert!(store.read("doomed").is_none());

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("worker did not stop after shutdown")
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn delta_worker_publishes_raw_snapshot_and_sibling_delta() {
    let mut registry = QueryRegistry::new();
    common::register_counting_net_query(&mut registry, "net_counters");
    let (deps, store, shutdown_tx) = deps_for(registry);

    let spec = Arc::new(MetricSpec {
        model_key: "network".into(),
        auxiliary_fields: vec![("counters".into(), "net_counters".into())],
        ..MetricSpec::default()
    });
    let handle = spawn_delta_worker(spec, "counters".into(), 1, deps);
    tokio::time::sleep(Duration::from_millis(1500)).await;

    // Raw snapshot refreshed under the model key.
    let raw = store.read("network").unwrap();
    assert!(raw.value.get("counters").is_some());

    // First tick baselines (null delta), second tick publishes the
    // per-interval difference of the monotonically growing counters.
    let sibling = store.read(&delta_key("network", 1)).unwrap();
    assert_eq!(sibling.value, json!({"bytes_sent": 50, "bytes_recv": 60}));

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("worker did not stop after shutdown")
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn delta_worker_first_tick_writes_a_null_delta() {
    let mut registry = QueryRegistry::new();
    common::register_counting_net_query(&mut registry, "net_counters");
    let (deps, store, shutdown_tx) = deps_for(registry);

    let spec = Arc::new(MetricSpec {
        model_key: "network".into(),
        auxiliary_fields: vec![("counters".into(), "net_counters".into())],
        ..MetricSpec::default()
    });
    let handle = spawn_delta_worker(spec, "counters".into(), 60, deps);
    tokio::time::sleep(Duration::from_millis(400)).await;

    let sibling = store.read(&delta_key("network", 60)).unwrap();
    assert_eq!(sibling.value, Value::Null);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("worker did not stop after shutdown")
        .unwrap();
}
