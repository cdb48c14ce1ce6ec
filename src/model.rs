use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. The only time type.
pub type Ms = i64;

pub const MINUTE_MS: Ms = 60_000;
pub const HOUR_MS: Ms = 60 * MINUTE_MS;
pub const DAY_MS: Ms = 24 * HOUR_MS;

/// Effective end of a possibly open-ended interval.
#[inline]
pub fn effective_end(end: Option<Ms>) -> Ms {
    end.unwrap_or(Ms::MAX)
}

/// Half-open overlap test over `[a_start, a_end)` and `[b_start, b_end)`.
/// A `None` end is unbounded. Touching intervals do not overlap.
pub fn overlaps(a_start: Ms, a_end: Option<Ms>, b_start: Ms, b_end: Option<Ms>) -> bool {
    a_start < effective_end(b_end) && b_start < effective_end(a_end)
}

/// Half-open interval `[start, end)`; `end == None` means open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Option<Ms>,
}

impl Span {
    pub fn new(start: Ms, end: Option<Ms>) -> Self {
        debug_assert!(end.is_none_or(|e| start < e), "Span start must be before end");
        Self { start, end }
    }

    pub fn bounded(start: Ms, end: Ms) -> Self {
        Self::new(start, Some(end))
    }

    pub fn open(start: Ms) -> Self {
        Self::new(start, None)
    }

    pub fn duration_ms(&self) -> Option<Ms> {
        self.end.map(|e| e - self.start)
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < effective_end(self.end)
    }

    /// True once the end has strictly passed. Open-ended spans never expire.
    pub fn has_expired(&self, now: Ms) -> bool {
        self.end.is_some_and(|e| e < now)
    }
}

/// Why a resource is out of service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowKind {
    ScheduledMaintenance,
    EmergencyClosure,
    WeatherClosure,
    Inspection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// An attraction. Owned externally; the engine only reads it and maintains `operational`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Ulid,
    pub name: String,
    pub operational: bool,
}

impl Resource {
    pub fn new(id: Ulid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            operational: true,
        }
    }
}

/// A time-bounded block on one resource. Refers to its resource by id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub kind: WindowKind,
    pub title: String,
    pub description: Option<String>,
    pub span: Span,
    /// Administrative switch, independent of time.
    pub active: bool,
    pub priority: Priority,
    pub created_by: Option<String>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Window {
    /// Active and `now` inside `[start, end)`. Uses the unshifted `now`.
    pub fn is_live(&self, now: Ms) -> bool {
        self.active && self.span.contains_instant(now)
    }

    pub fn state(&self, now: Ms) -> WindowState {
        if !self.active {
            WindowState::Disabled
        } else if self.span.end.is_some_and(|e| e <= now) {
            WindowState::Ended
        } else if self.span.start > now {
            WindowState::Scheduled
        } else {
            WindowState::Live
        }
    }
}

/// Per-window state derived on read; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowState {
    Scheduled,
    Live,
    Ended,
    Disabled,
}

/// Input for creating a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWindow {
    pub resource_id: Ulid,
    pub kind: WindowKind,
    pub title: String,
    pub description: Option<String>,
    pub start: Ms,
    pub end: Option<Ms>,
    pub priority: Priority,
    pub created_by: Option<String>,
}

/// Partial update: `None` fields keep their previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowPatch {
    pub kind: Option<WindowKind>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<Ms>,
    pub end: Option<Ms>,
    pub priority: Option<Priority>,
}

impl WindowPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge into `window`. Times are copied unchecked; callers validate the result.
    pub fn apply_to(self, window: &mut Window) {
        if let Some(kind) = self.kind {
            window.kind = kind;
        }
        if let Some(title) = self.title {
            window.title = title;
        }
        if let Some(description) = self.description {
            window.description = Some(description);
        }
        if let Some(start) = self.start {
            window.span.start = start;
        }
        if let Some(end) = self.end {
            window.span.end = Some(end);
        }
        if let Some(priority) = self.priority {
            window.priority = priority;
        }
    }
}

/// WAL record format. Flat, no nesting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ResourceRegistered {
        id: Ulid,
        name: String,
        operational: bool,
    },
    OperationalSet {
        id: Ulid,
        operational: bool,
    },
    WindowInserted {
        window: Window,
    },
    WindowUpdated {
        window: Window,
    },
    WindowDeleted {
        id: Ulid,
        resource_id: Ulid,
    },
}

// ── Query result types ───────────────────────────────────────────

/// Read model handed to outer layers: the window, its derived state and the resource name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowView {
    pub window: Window,
    pub state: WindowState,
    pub resource_name: Option<String>,
}
