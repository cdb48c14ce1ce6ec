//! Storage seams consumed by the engine.
//!
//! The engine never holds resource or window state itself; every read and
//! write goes through [`ResourceStore`] and [`WindowStore`]. The list methods
//! have default implementations in terms of [`WindowStore::list_all`] so a
//! minimal backend only needs the point operations.

mod durable;
mod memory;

pub use durable::WalStore;
pub use memory::InMemoryStore;

use async_trait::async_trait;
use thiserror::Error;
use ulid::Ulid;

use crate::model::*;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("already exists: {0}")]
    AlreadyExists(Ulid),
    #[error("WAL error: {0}")]
    Wal(String),
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get_resource(&self, id: Ulid) -> Result<Option<Resource>, StoreError>;

    async fn set_operational(&self, id: Ulid, operational: bool) -> Result<(), StoreError>;

    async fn list_resources(&self) -> Result<Vec<Resource>, StoreError>;
}

#[async_trait]
pub trait WindowStore: Send + Sync {
    async fn get_window(&self, id: Ulid) -> Result<Option<Window>, StoreError>;

    /// Fails with `AlreadyExists` if the id is taken.
    async fn insert_window(&self, window: &Window) -> Result<(), StoreError>;

    /// Replaces the stored window with the same id. Fails with `NotFound`.
    async fn update_window(&self, window: &Window) -> Result<(), StoreError>;

    async fn delete_window(&self, id: Ulid) -> Result<(), StoreError>;

    async fn list_all(&self) -> Result<Vec<Window>, StoreError>;

    async fn list_active(&self) -> Result<Vec<Window>, StoreError> {
        let mut windows = self.list_all().await?;
        windows.retain(|w| w.active);
        sort_by_start(&mut windows);
        Ok(windows)
    }

    /// Active windows of one resource, ascending by start.
    async fn list_active_by_resource(&self, resource_id: Ulid) -> Result<Vec<Window>, StoreError> {
        let mut windows = self.list_all().await?;
        windows.retain(|w| w.active && w.resource_id == resource_id);
        sort_by_start(&mut windows);
        Ok(windows)
    }

    /// Every window of one resource, newest `created_at` first.
    async fn list_by_resource(&self, resource_id: Ulid) -> Result<Vec<Window>, StoreError> {
        let mut windows = self.list_all().await?;
        windows.retain(|w| w.resource_id == resource_id);
        sort_newest_first(&mut windows);
        Ok(windows)
    }

    /// Active windows whose end is strictly before `now`.
    async fn list_expired(&self, now: Ms) -> Result<Vec<Window>, StoreError> {
        let mut windows = self.list_all().await?;
        windows.retain(|w| w.active && w.span.has_expired(now));
        sort_by_start(&mut windows);
        Ok(windows)
    }

    /// Active windows with `now < start <= until`, ascending by start.
    async fn list_upcoming(&self, now: Ms, until: Ms) -> Result<Vec<Window>, StoreError> {
        let mut windows = self.list_all().await?;
        windows.retain(|w| w.active && w.span.start > now && w.span.start <= until);
        sort_by_start(&mut windows);
        Ok(windows)
    }

    async fn list_currently_live(&self, now: Ms) -> Result<Vec<Window>, StoreError> {
        let mut windows = self.list_all().await?;
        windows.retain(|w| w.is_live(now));
        sort_by_start(&mut windows);
        Ok(windows)
    }

    /// Active windows with `now < end <= until`, ascending by end.
    async fn list_ending_soon(&self, now: Ms, until: Ms) -> Result<Vec<Window>, StoreError> {
        let mut windows = self.list_all().await?;
        windows.retain(|w| w.active && w.span.end.is_some_and(|e| e > now && e <= until));
        windows.sort_by_key(|w| (w.span.end, w.id));
        Ok(windows)
    }
}

pub(crate) fn sort_by_start(windows: &mut [Window]) {
    windows.sort_by_key(|w| (w.span.start, w.id));
}

pub(crate) fn sort_newest_first(windows: &mut [Window]) {
    windows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}
