use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use downtime::clock::SystemClock;
use downtime::config::Config;
use downtime::engine::Engine;
use downtime::store::WalStore;
use downtime::sweeper::{self, Sweeper};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    downtime::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let store = Arc::new(WalStore::open(config.data_dir.join("downtime.wal"))?);
    let engine = Arc::new(
        Engine::new(store.clone(), store.clone(), Arc::new(SystemClock))
            .with_lock_timeout(config.lock_timeout),
    );

    info!("downtime started");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  sweep_interval: {}s", config.sweep_interval.as_secs());
    info!("  compact_threshold: {}", config.compact_threshold);
    info!("  lock_timeout: {}ms", config.lock_timeout.as_millis());
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let sweeper_task = tokio::spawn(sweeper::run_sweeper(
        Arc::new(Sweeper::new(engine.clone())),
        config.sweep_interval,
    ));
    let compactor_task = tokio::spawn(sweeper::run_compactor(
        store.clone(),
        config.compact_threshold,
        config.compact_check_interval,
    ));

    shutdown_signal().await?;
    info!("shutdown signal received, stopping background tasks");
    sweeper_task.abort();
    compactor_task.abort();

    if let Err(e) = store.compact().await {
        tracing::warn!("final compaction failed: {e}");
    }
    info!("downtime stopped");
    Ok(())
}

async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r,
            _ = sigterm.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
