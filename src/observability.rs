use std::net::SocketAddr;

use crate::engine::EngineError;

// ── Request-driven ──────────────────────────────────────────────

/// Counter: engine operations. Labels: op, status.
pub const WINDOW_OPS_TOTAL: &str = "downtime_window_ops_total";

/// Histogram: engine operation latency in seconds. Labels: op.
pub const WINDOW_OP_DURATION_SECONDS: &str = "downtime_window_op_duration_seconds";

/// Counter: windows rejected because they overlap an active window.
pub const CONFLICTS_TOTAL: &str = "downtime_conflicts_total";

/// Counter: per-resource lock acquisitions that timed out.
pub const LOCK_TIMEOUTS_TOTAL: &str = "downtime_lock_timeouts_total";

/// Counter: `operational` flag transitions. Labels: to.
pub const OPERATIONAL_FLIPS_TOTAL: &str = "downtime_operational_flips_total";

/// Counter: availability recomputes that failed after the window write was committed.
pub const PROPAGATION_FAILURES_TOTAL: &str = "downtime_propagation_failures_total";

// ── Sweeper ─────────────────────────────────────────────────────

/// Counter: completed sweep runs.
pub const SWEEP_RUNS_TOTAL: &str = "downtime_sweep_runs_total";

/// Counter: sweep ticks skipped because a run was still in progress.
pub const SWEEP_SKIPPED_TOTAL: &str = "downtime_sweep_skipped_total";

/// Counter: windows deactivated by the sweeper.
pub const SWEEP_RETIRED_TOTAL: &str = "downtime_sweep_retired_total";

/// Counter: windows the sweeper failed to retire.
pub const SWEEP_FAILURES_TOTAL: &str = "downtime_sweep_failures_total";

/// Histogram: sweep run duration in seconds.
pub const SWEEP_DURATION_SECONDS: &str = "downtime_sweep_duration_seconds";

// ── Storage ─────────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "downtime_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "downtime_wal_flush_batch_size";

/// Counter: WAL compactions.
pub const WAL_COMPACTIONS_TOTAL: &str = "downtime_wal_compactions_total";

/// Install the Prometheus exporter on `port`. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short status label for an operation outcome.
pub fn status_label<T>(result: &Result<T, EngineError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(EngineError::Validation(_)) => "validation",
        Err(EngineError::NotFound(_)) => "not_found",
        Err(EngineError::Conflict(_)) => "conflict",
        Err(EngineError::Concurrency(_)) => "concurrency",
        Err(EngineError::Storage(_)) => "storage",
    }
}
