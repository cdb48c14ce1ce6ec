use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

use super::{sort_by_start, sort_newest_first, ResourceStore, StoreError, WindowStore};

pub struct InMemoryStore {
    resources: DashMap<Ulid, Resource>,
    windows: DashMap<Ulid, Window>,
    /// Resource → window ids, so per-resource listings skip the full scan.
    by_resource: DashMap<Ulid, Vec<Ulid>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
            windows: DashMap::new(),
            by_resource: DashMap::new(),
        }
    }

    // ── Resources ────────────────────────────────────────────

    pub fn insert_resource(&self, resource: Resource) {
        self.resources.insert(resource.id, resource);
    }

    pub fn contains_resource(&self, id: &Ulid) -> bool {
        self.resources.contains_key(id)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn resource(&self, id: &Ulid) -> Option<Resource> {
        self.resources.get(id).map(|e| e.value().clone())
    }

    // ── Windows ──────────────────────────────────────────────

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn contains_window(&self, id: &Ulid) -> bool {
        self.windows.contains_key(id)
    }

    fn windows_of(&self, resource_id: &Ulid) -> Vec<Window> {
        let ids = self
            .by_resource
            .get(resource_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        ids.iter()
            .filter_map(|id| self.windows.get(id).map(|w| w.value().clone()))
            .collect()
    }

    // ── Event application ────────────────────────────────────

    /// Apply a WAL event. Unconditional: callers check existence first.
    pub fn apply_event(&self, event: &Event) {
        match event {
            Event::ResourceRegistered {
                id,
                name,
                operational,
            } => {
                self.resources.insert(
                    *id,
                    Resource {
                        id: *id,
                        name: name.clone(),
                        operational: *operational,
                    },
                );
            }
            Event::OperationalSet { id, operational } => {
                if let Some(mut r) = self.resources.get_mut(id) {
                    r.operational = *operational;
                }
            }
            Event::WindowInserted { window } => {
                self.by_resource
                    .entry(window.resource_id)
                    .or_default()
                    .push(window.id);
                self.windows.insert(window.id, window.clone());
            }
            Event::WindowUpdated { window } => {
                self.windows.insert(window.id, window.clone());
            }
            Event::WindowDeleted { id, resource_id } => {
                self.windows.remove(id);
                if let Some(mut ids) = self.by_resource.get_mut(resource_id) {
                    ids.retain(|w| w != id);
                }
            }
        }
    }

    /// Minimal event list that recreates the current state.
    pub fn snapshot_events(&self) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .resources
            .iter()
            .map(|r| Event::ResourceRegistered {
                id: r.id,
                name: r.name.clone(),
                operational: r.operational,
            })
            .collect();
        let mut windows: Vec<Window> = self.windows.iter().map(|w| w.value().clone()).collect();
        windows.sort_by_key(|w| w.id);
        events.extend(windows.into_iter().map(|window| Event::WindowInserted { window }));
        events
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get_resource(&self, id: Ulid) -> Result<Option<Resource>, StoreError> {
        Ok(self.resource(&id))
    }

    async fn set_operational(&self, id: Ulid, operational: bool) -> Result<(), StoreError> {
        let mut r = self.resources.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        r.operational = operational;
        Ok(())
    }

    async fn list_resources(&self) -> Result<Vec<Resource>, StoreError> {
        let mut resources: Vec<Resource> = self.resources.iter().map(|r| r.value().clone()).collect();
        resources.sort_by_key(|r| r.id);
        Ok(resources)
    }
}

#[async_trait]
impl WindowStore for InMemoryStore {
    async fn get_window(&self, id: Ulid) -> Result<Option<Window>, StoreError> {
        Ok(self.windows.get(&id).map(|w| w.value().clone()))
    }

    async fn insert_window(&self, window: &Window) -> Result<(), StoreError> {
        if self.windows.contains_key(&window.id) {
            return Err(StoreError::AlreadyExists(window.id));
        }
        self.apply_event(&Event::WindowInserted {
            window: window.clone(),
        });
        Ok(())
    }

    async fn update_window(&self, window: &Window) -> Result<(), StoreError> {
        let mut slot = self
            .windows
            .get_mut(&window.id)
            .ok_or(StoreError::NotFound(window.id))?;
        *slot = window.clone();
        Ok(())
    }

    async fn delete_window(&self, id: Ulid) -> Result<(), StoreError> {
        let resource_id = self
            .windows
            .get(&id)
            .map(|w| w.resource_id)
            .ok_or(StoreError::NotFound(id))?;
        self.apply_event(&Event::WindowDeleted { id, resource_id });
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Window>, StoreError> {
        Ok(self.windows.iter().map(|w| w.value().clone()).collect())
    }

    async fn list_active_by_resource(&self, resource_id: Ulid) -> Result<Vec<Window>, StoreError> {
        let mut windows = self.windows_of(&resource_id);
        windows.retain(|w| w.active);
        sort_by_start(&mut windows);
        Ok(windows)
    }

    async fn list_by_resource(&self, resource_id: Ulid) -> Result<Vec<Window>, StoreError> {
        let mut windows = self.windows_of(&resource_id);
        sort_newest_first(&mut windows);
        Ok(windows)
    }
}
