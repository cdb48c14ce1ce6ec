use std::time::Instant;

use tracing::info;
use ulid::Ulid;

use crate::model::*;

use super::conflict::{
    check_no_conflict, validate_created_by, validate_description, validate_span,
    validate_start_not_past, validate_title,
};
use super::{record, Engine, EngineError};

impl Engine {
    /// Validate, conflict-check and persist a new active window, then
    /// recompute its resource's availability.
    pub async fn create_window(&self, new: NewWindow) -> Result<Window, EngineError> {
        let started = Instant::now();
        let result = self.create_window_locked(new).await;
        record("create", started, &result);
        result
    }

    async fn create_window_locked(&self, new: NewWindow) -> Result<Window, EngineError> {
        let resource_id = new.resource_id;
        if self.resources.get_resource(resource_id).await?.is_none() {
            return Err(EngineError::NotFound(resource_id));
        }

        let now = self.clock.now();
        let span = Span {
            start: new.start,
            end: new.end,
        };
        validate_start_not_past(span.start, now)?;
        validate_span(&span)?;
        validate_title(&new.title)?;
        validate_description(new.description.as_deref())?;
        validate_created_by(new.created_by.as_deref())?;

        let _guard = self.lock_resource(resource_id).await?;
        let active = self.windows.list_active_by_resource(resource_id).await?;
        check_no_conflict(&active, &span, None)?;

        let window = Window {
            id: Ulid::new(),
            resource_id,
            kind: new.kind,
            title: new.title,
            description: new.description,
            span,
            active: true,
            priority: new.priority,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        };
        self.windows.insert_window(&window).await?;
        self.propagate_committed(resource_id, now).await;

        info!(
            window = %window.id,
            resource = %resource_id,
            kind = ?window.kind,
            start = window.span.start,
            end = ?window.span.end,
            "window created"
        );
        Ok(window)
    }

    /// Partial update. Fields left `None` in `patch` keep their value; the
    /// merged window is re-validated and re-checked against every other
    /// active window on the resource.
    pub async fn update_window(&self, id: Ulid, patch: WindowPatch) -> Result<Window, EngineError> {
        let started = Instant::now();
        let result = self.update_window_locked(id, patch).await;
        record("update", started, &result);
        result
    }

    async fn update_window_locked(&self, id: Ulid, patch: WindowPatch) -> Result<Window, EngineError> {
        let (current, _guard) = self.lock_window(id).await?;
        let now = self.clock.now();

        if let Some(title) = &patch.title {
            validate_title(title)?;
        }
        validate_description(patch.description.as_deref())?;
        if let Some(start) = patch.start
            && start != current.span.start
        {
            validate_start_not_past(start, now)?;
        }

        let mut merged = current.clone();
        patch.apply_to(&mut merged);
        validate_span(&merged.span)?;

        // Inactive windows are re-checked when they are switched back on.
        if merged.active {
            let active = self.windows.list_active_by_resource(merged.resource_id).await?;
            check_no_conflict(&active, &merged.span, Some(id))?;
        }

        merged.updated_at = now;
        self.windows.update_window(&merged).await?;
        self.propagate_committed(merged.resource_id, now).await;

        info!(window = %id, resource = %merged.resource_id, "window updated");
        Ok(merged)
    }

    pub async fn delete_window(&self, id: Ulid) -> Result<(), EngineError> {
        let started = Instant::now();
        let result = self.delete_window_locked(id).await;
        record("delete", started, &result);
        result
    }

    async fn delete_window_locked(&self, id: Ulid) -> Result<(), EngineError> {
        let (window, _guard) = self.lock_window(id).await?;
        self.windows.delete_window(id).await?;
        self.propagate_committed(window.resource_id, self.clock.now()).await;
        info!(window = %id, resource = %window.resource_id, "window deleted");
        Ok(())
    }

    /// Flip the administrative flag. Switching a window back on re-runs the
    /// overlap check and fails with `Conflict` if another active window now
    /// overlaps it.
    pub async fn set_window_active(&self, id: Ulid, active: bool) -> Result<Window, EngineError> {
        let started = Instant::now();
        let result = self.set_window_active_locked(id, active).await;
        record("set_active", started, &result);
        result
    }

    async fn set_window_active_locked(&self, id: Ulid, active: bool) -> Result<Window, EngineError> {
        let (mut window, _guard) = self.lock_window(id).await?;
        let now = self.clock.now();

        if window.active != active {
            if active {
                let others = self.windows.list_active_by_resource(window.resource_id).await?;
                check_no_conflict(&others, &window.span, Some(id))?;
            }
            window.active = active;
            window.updated_at = now;
            self.windows.update_window(&window).await?;
            info!(window = %id, resource = %window.resource_id, active, "window toggled");
        }
        self.propagate_committed(window.resource_id, now).await;
        Ok(window)
    }
}
