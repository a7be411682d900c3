// Background sampling tasks: one independent repeating task per
// background-enabled metric family, plus one per delta-bearing series and
// cadence. Tasks communicate only through the snapshot store.

use crate::delta::{DeltaOutcome, DeltaTracker};
use crate::sampler;
use crate::source::QueryRegistry;
use crate::spec::MetricSpec;
use crate::store::{SnapshotStore, delta_key};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::time::{Duration, interval};

/// Registry, store, counters, and shutdown shared by every worker task.
#[derive(Clone)]
pub struct WorkerDeps {
    pub registry: Arc<QueryRegistry>,
    pub store: Arc<SnapshotStore>,
    pub samples_total: Arc<AtomicU64>,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// One sample step, run off the async executor because OS queries block
/// (interval-windowed CPU reads in particular).
async fn sample_blocking(
    spec: &Arc<MetricSpec>,
    deps: &WorkerDeps,
) -> Option<crate::store::Snapshot> {
    let spec = Arc::clone(spec);
    let registry = Arc::clone(&deps.registry);
    let store = Arc::clone(&deps.store);
    let result =
        tokio::task::spawn_blocking(move || sampler::sample(&spec, &registry, &store)).await;
    match result {
        Ok(Ok(snapshot)) => Some(snapshot),
        // Skip this tick and continue at the next interval; a failing
        // query must not starve the metric indefinitely.
        Ok(Err(e)) => {
            tracing::warn!(error = %e, operation = "sample", "sample failed; skipping tick");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, operation = "sample", "sample task join failed");
            None
        }
    }
}

/// Repeating sampler for one metric family. Updates are strictly
/// sequential: a new sample never starts while the previous one or the
/// sleep is pending.
pub fn spawn_metric_worker(spec: MetricSpec, deps: WorkerDeps) -> tokio::task::JoinHandle<()> {
    let spec = Arc::new(spec);
    let mut deps = deps;
    tokio::spawn(async move {
        let span = tracing::span!(
            tracing::Level::DEBUG,
            "metric_worker",
            model_key = %spec.model_key,
            interval_secs = spec.sample_interval_secs
        );
        let _guard = span.enter();

        let mut tick = interval(Duration::from_secs(spec.sample_interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Some(snapshot) = sample_blocking(&spec, &deps).await {
                        deps.store.write(&spec.model_key, Value::Object(snapshot));
                        deps.samples_total.fetch_add(1, Ordering::Relaxed);
                    }
                }
                _ = deps.shutdown_rx.changed() => {
                    tracing::debug!("metric worker shutting down");
                    break;
                }
            }
        }
    })
}

/// Repeating delta task for one (metric, tracked field, cadence) series.
/// Each tick samples fresh, refreshes the raw snapshot under the model
/// key, and writes the interval delta under the sibling delta key.
pub fn spawn_delta_worker(
    spec: Arc<MetricSpec>,
    track_field: String,
    cadence_secs: u64,
    deps: WorkerDeps,
) -> tokio::task::JoinHandle<()> {
    let mut deps = deps;
    tokio::spawn(async move {
        let sibling = delta_key(&spec.model_key, cadence_secs);
        let span = tracing::span!(
            tracing::Level::DEBUG,
            "delta_worker",
            model_key = %spec.model_key,
            track_field = %track_field,
            cadence_secs
        );
        let _guard = span.enter();

        let mut tracker = DeltaTracker::new();
        let mut tick = interval(Duration::from_secs(cadence_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let Some(snapshot) = sample_blocking(&spec, &deps).await else {
                        continue;
                    };
                    let tracked = snapshot.get(&track_field).cloned().unwrap_or(Value::Null);
                    deps.store.write(&spec.model_key, Value::Object(snapshot));
                    deps.samples_total.fetch_add(1, Ordering::Relaxed);
                    let delta = match tracker.tick(&tracked) {
                        DeltaOutcome::Delta(delta) => delta,
                        DeltaOutcome::Baseline => Value::Null,
                        DeltaOutcome::CounterReset { fields } => {
                            tracing::warn!(
                                series = %sibling,
                                fields = ?fields,
                                operation = "delta_tick",
                                "cumulative counter reset detected; series rebaselined"
                            );
                            Value::Null
                        }
                    };
                    deps.store.write(&sibling, delta);
                }
                _ = deps.shutdown_rx.changed() => {
                    tracing::debug!("delta worker shutting down");
                    break;
                }
            }
        }
    })
}

/// Periodic app-stats line: how many keys the store holds and how many
/// samples the workers have produced.
pub fn spawn_stats_logger(
    store: Arc<SnapshotStore>,
    samples_total: Arc<AtomicU64>,
    log_interval_secs: u64,
    mut shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(log_interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick fires immediately; nothing to report yet.
        tick.tick().await;
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    tracing::info!(
                        metric_keys = store.len(),
                        samples_total = samples_total.load(Ordering::Relaxed),
                        "app stats"
                    );
                }
                _ = shutdown_rx.changed() => break,
            }
        }
    })
}
