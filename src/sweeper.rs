use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::engine::{Engine, SweepReport};
use crate::observability;
use crate::store::WalStore;

/// Single-flight wrapper around [`Engine::sweep`]. A tick that arrives while
/// a run is still going is dropped, not queued.
pub struct Sweeper {
    engine: Arc<Engine>,
    running: AtomicBool,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Sweeper {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one sweep, or return `None` if another is in progress.
    pub async fn run_once(&self) -> Option<SweepReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            metrics::counter!(observability::SWEEP_SKIPPED_TOTAL).increment(1);
            debug!("sweep still running, skipping tick");
            return None;
        }
        let _guard = RunningGuard(&self.running);
        Some(self.engine.sweep().await)
    }
}

/// Background task: sweep every `period`. The first tick fires immediately
/// so a restarted daemon catches up on windows that ended while it was down.
pub async fn run_sweeper(sweeper: Arc<Sweeper>, period: Duration) {
    info!(period_secs = period.as_secs(), "sweeper started");
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let sweeper = sweeper.clone();
        // Overlapping runs are skipped inside run_once.
        tokio::spawn(async move {
            sweeper.run_once().await;
        });
    }
}

/// Background task: compact the WAL once `threshold` appends have piled up
/// since the last compaction.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let appends = store.appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match store.compact().await {
            Ok(()) => info!(appends, "WAL compacted"),
            Err(e) => warn!("WAL compaction failed: {e}"),
        }
    }
}
