use anyhow::Result;
use device_telemetry::*;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let source = Arc::new(source::SysinfoSource::new(Duration::from_secs(
        app_config.sampling.cpu_percent_window_secs,
    )));
    let registry = Arc::new(source::build_registry(&source));

    let specs = catalog::catalog(
        app_config.sampling.interval_secs,
        app_config.sampling.cpu_percent_window_secs,
        app_config.delta.fast_interval_secs,
    );
    // Broken specs must never reach the scheduler.
    spec::validate_catalog(&specs, &registry)?;

    let store = Arc::new(store::SnapshotStore::new());
    let samples_total = Arc::new(AtomicU64::new(0));
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let deps = worker::WorkerDeps {
        registry,
        store: store.clone(),
        samples_total: samples_total.clone(),
        shutdown_rx: shutdown_rx.clone(),
    };

    let mut handles = Vec::new();
    let mut delta_jobs = Vec::new();
    for series in catalog::DELTA_SERIES {
        if let Some(metric_spec) = specs.iter().find(|s| s.model_key == series.model_key) {
            delta_jobs.push((series, Arc::new(metric_spec.clone())));
        }
    }

    for metric_spec in specs {
        if !metric_spec.background_enabled {
            continue;
        }
        tracing::info!(
            model_key = %metric_spec.model_key,
            interval_secs = metric_spec.sample_interval_secs,
            "starting metric worker"
        );
        handles.push(worker::spawn_metric_worker(metric_spec, deps.clone()));
    }

    for (series, metric_spec) in delta_jobs {
        for cadence in [
            app_config.delta.fast_interval_secs,
            app_config.delta.slow_interval_secs,
        ] {
            tracing::info!(
                model_key = series.model_key,
                track_field = series.track_field,
                cadence_secs = cadence,
                "starting delta worker"
            );
            handles.push(worker::spawn_delta_worker(
                metric_spec.clone(),
                series.track_field.to_string(),
                cadence,
                deps.clone(),
            ));
        }
    }

    handles.push(worker::spawn_stats_logger(
        store,
        samples_total,
        app_config.monitoring.stats_log_interval_secs,
        shutdown_rx,
    ));

    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                tokio::signal::ctrl_c().await?;
                let _ = shutdown_tx.send(true);
                for handle in handles {
                    let _ = handle.await;
                }
                return Ok(());
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    tracing::info!("Received shutdown signal");
    let _ = shutdown_tx.send(true);
    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}
