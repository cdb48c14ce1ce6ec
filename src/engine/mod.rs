mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
pub mod retry;
mod sweep;

pub use availability::{blocks_at, is_blocked};
pub use error::EngineError;
pub use sweep::SweepReport;

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use ulid::Ulid;

use crate::clock::Clock;
use crate::model::*;
use crate::observability;
use crate::store::{ResourceStore, WindowStore};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// One async mutex per resource. Every write touching a resource runs
/// "read active windows → check → write → recompute" under its lock.
#[derive(Default)]
struct ResourceLocks {
    locks: DashMap<Ulid, Arc<Mutex<()>>>,
}

impl ResourceLocks {
    async fn acquire(&self, resource_id: Ulid, timeout: Duration) -> Result<OwnedMutexGuard<()>, EngineError> {
        let lock = self.locks.entry(resource_id).or_default().clone();
        match tokio::time::timeout(timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                metrics::counter!(observability::LOCK_TIMEOUTS_TOTAL).increment(1);
                Err(EngineError::Concurrency(resource_id))
            }
        }
    }
}

/// The maintenance window engine: manager, propagator, sweeper logic and
/// query service over a pair of stores.
pub struct Engine {
    pub(super) windows: Arc<dyn WindowStore>,
    pub(super) resources: Arc<dyn ResourceStore>,
    pub(super) clock: Arc<dyn Clock>,
    locks: ResourceLocks,
    lock_timeout: Duration,
}

impl Engine {
    pub fn new(
        windows: Arc<dyn WindowStore>,
        resources: Arc<dyn ResourceStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            windows,
            resources,
            clock,
            locks: ResourceLocks::default(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn now(&self) -> Ms {
        self.clock.now()
    }

    pub(super) async fn lock_resource(&self, resource_id: Ulid) -> Result<OwnedMutexGuard<()>, EngineError> {
        self.locks.acquire(resource_id, self.lock_timeout).await
    }

    /// Lookup window → resource, acquire the resource lock, then re-read the
    /// window so the caller sees its state as of lock acquisition.
    pub(super) async fn lock_window(&self, id: Ulid) -> Result<(Window, OwnedMutexGuard<()>), EngineError> {
        let resource_id = self
            .windows
            .get_window(id)
            .await?
            .ok_or(EngineError::NotFound(id))?
            .resource_id;
        let guard = self.lock_resource(resource_id).await?;
        let window = self
            .windows
            .get_window(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        Ok((window, guard))
    }
}

fn record<T>(op: &'static str, started: Instant, result: &Result<T, EngineError>) {
    metrics::counter!(
        observability::WINDOW_OPS_TOTAL,
        "op" => op,
        "status" => observability::status_label(result)
    )
    .increment(1);
    metrics::histogram!(observability::WINDOW_OP_DURATION_SECONDS, "op" => op)
        .record(started.elapsed().as_secs_f64());
}
