use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::BLOCKING_LOOKAHEAD_MS;
use crate::model::*;
use crate::observability;

use super::{Engine, EngineError};

// ── Blocking formula ──────────────────────────────────────────────

/// Whether `window` closes its resource at `now`. A window starts blocking
/// [`BLOCKING_LOOKAHEAD_MS`] before its nominal start and stops at its end.
///
/// This is the only place that decides "is this resource closed". It is
/// deliberately not [`Window::is_live`], which uses the unshifted `now`.
pub fn blocks_at(window: &Window, now: Ms) -> bool {
    window.active
        && window.span.start <= now.saturating_add(BLOCKING_LOOKAHEAD_MS)
        && window.span.end.is_none_or(|e| e > now)
}

pub fn is_blocked(windows: &[Window], now: Ms) -> bool {
    windows.iter().any(|w| blocks_at(w, now))
}

impl Engine {
    /// Recompute `operational` for a resource and persist it if it changed.
    /// Caller holds the resource lock. Returns the new flag.
    pub(super) async fn propagate(&self, resource_id: Ulid, now: Ms) -> Result<bool, EngineError> {
        let resource = self
            .resources
            .get_resource(resource_id)
            .await?
            .ok_or(EngineError::NotFound(resource_id))?;
        let active = self.windows.list_active_by_resource(resource_id).await?;
        let operational = !is_blocked(&active, now);

        if resource.operational != operational {
            self.resources.set_operational(resource_id, operational).await?;
            let to = if operational { "open" } else { "closed" };
            metrics::counter!(observability::OPERATIONAL_FLIPS_TOTAL, "to" => to).increment(1);
            info!(resource = %resource_id, name = %resource.name, operational, "resource availability changed");
        }
        Ok(operational)
    }

    /// Recompute after the window write is already durable. Errors are logged
    /// and counted, not returned; the sweep's refresh repairs the flag.
    pub(super) async fn propagate_committed(&self, resource_id: Ulid, now: Ms) {
        if let Err(e) = self.propagate(resource_id, now).await {
            metrics::counter!(observability::PROPAGATION_FAILURES_TOTAL).increment(1);
            warn!(resource = %resource_id, "availability recompute failed, left for sweep: {e}");
        }
    }

    /// Take the resource lock and recompute its `operational` flag at the current time.
    pub async fn recompute_availability(&self, resource_id: Ulid) -> Result<bool, EngineError> {
        let _guard = self.lock_resource(resource_id).await?;
        self.propagate(resource_id, self.clock.now()).await
    }
}
