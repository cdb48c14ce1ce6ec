use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::model::*;
use crate::observability;

use super::availability::is_blocked;
use super::{Engine, EngineError};

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired candidates found by the scan.
    pub scanned: usize,
    /// Windows deactivated by this pass.
    pub retired: usize,
    /// Resources whose stored `operational` flag was stale and got recomputed.
    pub refreshed: usize,
    /// Windows or resources that failed; each was logged and skipped.
    pub failed: usize,
}

impl Engine {
    /// Deactivate every active window whose end has passed, then bring
    /// resources whose windows started or ended since the last write back in
    /// line. Failures are isolated per window and per resource.
    pub async fn sweep(&self) -> SweepReport {
        let started = Instant::now();
        let now = self.clock.now();
        let mut report = SweepReport::default();

        match self.windows.list_expired(now).await {
            Ok(expired) => {
                report.scanned = expired.len();
                for window in expired {
                    match self.retire_expired(window.id, now).await {
                        Ok(true) => report.retired += 1,
                        Ok(false) => debug!(window = %window.id, "already retired"),
                        Err(EngineError::NotFound(_)) => debug!(window = %window.id, "deleted before retire"),
                        Err(e) => {
                            report.failed += 1;
                            warn!(window = %window.id, resource = %window.resource_id, "sweep retire failed: {e}");
                        }
                    }
                }
            }
            Err(e) => {
                report.failed += 1;
                warn!("sweep scan failed: {e}");
            }
        }

        match self.stale_resources(now).await {
            Ok(stale) => {
                for resource_id in stale {
                    match self.refresh(resource_id, now).await {
                        Ok(()) => report.refreshed += 1,
                        Err(e) => {
                            report.failed += 1;
                            warn!(resource = %resource_id, "sweep refresh failed: {e}");
                        }
                    }
                }
            }
            Err(e) => {
                report.failed += 1;
                warn!("sweep refresh scan failed: {e}");
            }
        }

        metrics::counter!(observability::SWEEP_RUNS_TOTAL).increment(1);
        metrics::counter!(observability::SWEEP_RETIRED_TOTAL).increment(report.retired as u64);
        metrics::counter!(observability::SWEEP_FAILURES_TOTAL).increment(report.failed as u64);
        metrics::histogram!(observability::SWEEP_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        if report.retired > 0 || report.refreshed > 0 || report.failed > 0 {
            info!(
                scanned = report.scanned,
                retired = report.retired,
                refreshed = report.refreshed,
                failed = report.failed,
                "sweep finished"
            );
        }
        report
    }

    /// Re-read `id` under its resource lock and deactivate it if it is still
    /// active and expired at `now`. Returns whether it was retired.
    pub(super) async fn retire_expired(&self, id: Ulid, now: Ms) -> Result<bool, EngineError> {
        let (mut window, _guard) = self.lock_window(id).await?;
        if !window.active || !window.span.has_expired(now) {
            return Ok(false);
        }
        window.active = false;
        window.updated_at = now;
        self.windows.update_window(&window).await?;
        self.propagate_committed(window.resource_id, now).await;
        info!(window = %id, resource = %window.resource_id, end = ?window.span.end, "window retired");
        Ok(true)
    }

    /// Every known resource whose stored flag disagrees with the blocking
    /// formula at `now`. This catches windows that started or ended with no
    /// write, and flags left behind by a recompute that failed after its
    /// window write, including resources with no active windows left.
    async fn stale_resources(&self, now: Ms) -> Result<Vec<Ulid>, EngineError> {
        let mut by_resource: BTreeMap<Ulid, Vec<Window>> = BTreeMap::new();
        for window in self.windows.list_active().await? {
            by_resource.entry(window.resource_id).or_default().push(window);
        }

        let stale = self
            .resources
            .list_resources()
            .await?
            .into_iter()
            .filter(|r| {
                let windows = by_resource.get(&r.id).map(Vec::as_slice).unwrap_or_default();
                r.operational == is_blocked(windows, now)
            })
            .map(|r| r.id)
            .collect();
        Ok(stale)
    }

    async fn refresh(&self, resource_id: Ulid, now: Ms) -> Result<(), EngineError> {
        let _guard = self.lock_resource(resource_id).await?;
        self.propagate(resource_id, now).await?;
        Ok(())
    }
}
