use ulid::Ulid;

use crate::limits::{DEFAULT_UPCOMING_DAYS, MAX_HORIZON_MS};
use crate::model::*;
use crate::store::{sort_by_start, sort_newest_first};

use super::conflict::{find_conflicts, validate_span};
use super::{Engine, EngineError};

impl Engine {
    pub async fn get_window(&self, id: Ulid) -> Result<Window, EngineError> {
        self.windows
            .get_window(id)
            .await?
            .ok_or(EngineError::NotFound(id))
    }

    pub async fn get_resource(&self, id: Ulid) -> Result<Resource, EngineError> {
        self.resources
            .get_resource(id)
            .await?
            .ok_or(EngineError::NotFound(id))
    }

    pub async fn active_windows(&self) -> Result<Vec<Window>, EngineError> {
        Ok(self.windows.list_active().await?)
    }

    /// Full history for a resource, newest first. An unknown resource simply
    /// has no windows.
    pub async fn windows_by_resource(&self, resource_id: Ulid) -> Result<Vec<Window>, EngineError> {
        Ok(self.windows.list_by_resource(resource_id).await?)
    }

    /// Windows whose `[start, end)` contains the current instant, without the
    /// blocking look-ahead.
    pub async fn currently_live(&self) -> Result<Vec<Window>, EngineError> {
        Ok(self.windows.list_currently_live(self.clock.now()).await?)
    }

    /// Active windows starting within the next `horizon_days`, soonest first.
    pub async fn upcoming(&self, horizon_days: u32) -> Result<Vec<Window>, EngineError> {
        let now = self.clock.now();
        let until = now.saturating_add(horizon_ms(i64::from(horizon_days) * DAY_MS));
        Ok(self.windows.list_upcoming(now, until).await?)
    }

    pub async fn upcoming_default(&self) -> Result<Vec<Window>, EngineError> {
        self.upcoming(DEFAULT_UPCOMING_DAYS).await
    }

    /// Active windows due to end within the next `horizon_hours`, soonest first.
    pub async fn ending_soon(&self, horizon_hours: u32) -> Result<Vec<Window>, EngineError> {
        let now = self.clock.now();
        let until = now.saturating_add(horizon_ms(i64::from(horizon_hours) * HOUR_MS));
        Ok(self.windows.list_ending_soon(now, until).await?)
    }

    /// Dry run of the create/update overlap check. Returns the active windows
    /// on `resource_id` that `[start, end)` would collide with.
    pub async fn preview_conflicts(
        &self,
        resource_id: Ulid,
        start: Ms,
        end: Option<Ms>,
        exclude: Option<Ulid>,
    ) -> Result<Vec<Window>, EngineError> {
        let span = Span { start, end };
        validate_span(&span)?;
        if self.resources.get_resource(resource_id).await?.is_none() {
            return Err(EngineError::NotFound(resource_id));
        }
        let active = self.windows.list_active_by_resource(resource_id).await?;
        Ok(find_conflicts(&active, &span, exclude).cloned().collect())
    }

    pub async fn count_active_by_priority(&self, priority: Priority) -> Result<usize, EngineError> {
        let active = self.windows.list_active().await?;
        Ok(active.iter().filter(|w| w.priority == priority).count())
    }

    pub async fn windows_by_kind(&self, kind: WindowKind) -> Result<Vec<Window>, EngineError> {
        self.filtered(|w| w.kind == kind, sort_by_start).await
    }

    pub async fn windows_by_priority(&self, priority: Priority) -> Result<Vec<Window>, EngineError> {
        self.filtered(|w| w.priority == priority, sort_by_start).await
    }

    /// Everything one author filed, newest first.
    pub async fn windows_created_by(&self, author: &str) -> Result<Vec<Window>, EngineError> {
        self.filtered(|w| w.created_by.as_deref() == Some(author), sort_newest_first)
            .await
    }

    pub async fn window_view(&self, id: Ulid) -> Result<WindowView, EngineError> {
        let window = self.get_window(id).await?;
        let mut views = self.views(vec![window]).await?;
        views.pop().ok_or(EngineError::NotFound(id))
    }

    /// Attach derived state and resource names, evaluated at one instant.
    pub async fn views(&self, windows: Vec<Window>) -> Result<Vec<WindowView>, EngineError> {
        let now = self.clock.now();
        let mut out = Vec::with_capacity(windows.len());
        for window in windows {
            let resource_name = self
                .resources
                .get_resource(window.resource_id)
                .await?
                .map(|r| r.name);
            out.push(WindowView {
                state: window.state(now),
                window,
                resource_name,
            });
        }
        Ok(out)
    }

    async fn filtered(
        &self,
        keep: impl Fn(&Window) -> bool,
        sort: fn(&mut [Window]),
    ) -> Result<Vec<Window>, EngineError> {
        let mut windows = self.windows.list_all().await?;
        windows.retain(|w| keep(w));
        sort(&mut windows);
        Ok(windows)
    }
}

fn horizon_ms(requested: Ms) -> Ms {
    requested.min(MAX_HORIZON_MS)
}
