use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn validate_span(span: &Span) -> Result<(), EngineError> {
    let in_range = |t: Ms| (MIN_VALID_TIMESTAMP_MS..=MAX_VALID_TIMESTAMP_MS).contains(&t);
    if !in_range(span.start) || span.end.is_some_and(|e| !in_range(e)) {
        return Err(EngineError::invalid("timestamp out of range"));
    }
    if span.end.is_some_and(|e| e <= span.start) {
        return Err(EngineError::invalid("end must be after start"));
    }
    Ok(())
}

/// A new start may lag `now` by at most [`START_TOLERANCE_MS`].
pub(crate) fn validate_start_not_past(start: Ms, now: Ms) -> Result<(), EngineError> {
    if start < now - START_TOLERANCE_MS {
        return Err(EngineError::invalid("start cannot be in the past"));
    }
    Ok(())
}

pub(crate) fn validate_title(title: &str) -> Result<(), EngineError> {
    let len = title.trim().chars().count();
    if !(MIN_TITLE_LEN..=MAX_TITLE_LEN).contains(&len) {
        return Err(EngineError::invalid(format!(
            "title must be between {MIN_TITLE_LEN} and {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

pub(crate) fn validate_description(description: Option<&str>) -> Result<(), EngineError> {
    if description.is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN) {
        return Err(EngineError::invalid(format!(
            "description cannot exceed {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

pub(crate) fn validate_created_by(created_by: Option<&str>) -> Result<(), EngineError> {
    if created_by.is_some_and(|c| c.chars().count() > MAX_CREATED_BY_LEN) {
        return Err(EngineError::invalid(format!(
            "created_by cannot exceed {MAX_CREATED_BY_LEN} characters"
        )));
    }
    Ok(())
}

/// Windows among `active` whose span overlaps `span`, skipping `exclude`.
/// Kind-agnostic: any active window blocks any other.
pub(crate) fn find_conflicts<'a>(
    active: &'a [Window],
    span: &Span,
    exclude: Option<Ulid>,
) -> impl Iterator<Item = &'a Window> {
    active
        .iter()
        .filter(move |w| w.active && Some(w.id) != exclude && w.span.overlaps(span))
}

pub(crate) fn check_no_conflict(
    active: &[Window],
    span: &Span,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    let ids: Vec<Ulid> = find_conflicts(active, span, exclude).map(|w| w.id).collect();
    if ids.is_empty() {
        Ok(())
    } else {
        metrics::counter!(crate::observability::CONFLICTS_TOTAL).increment(1);
        Err(EngineError::Conflict(ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: Ms = 1_800_000_000_000;

    fn active(start: Ms, end: Option<Ms>) -> Window {
        Window {
            id: Ulid::new(),
            resource_id: Ulid::new(),
            kind: WindowKind::ScheduledMaintenance,
            title: "Quarterly service".into(),
            description: None,
            span: Span::new(start, end),
            active: true,
            priority: Priority::Low,
            created_by: None,
            created_at: T0,
            updated_at: T0,
        }
    }

    #[test]
    fn span_validation() {
        assert!(validate_span(&Span::bounded(T0, T0 + 1)).is_ok());
        assert!(validate_span(&Span::open(T0)).is_ok());
        assert!(matches!(
            validate_span(&Span { start: T0, end: Some(T0) }),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            validate_span(&Span { start: T0, end: Some(T0 - 1) }),
            Err(EngineError::Validation(_))
        ));
        assert!(validate_span(&Span::open(0)).is_err());
        assert!(validate_span(&Span::bounded(T0, MAX_VALID_TIMESTAMP_MS + 1)).is_err());
    }

    #[test]
    fn start_tolerance_boundary() {
        assert!(validate_start_not_past(T0 - 4 * MINUTE_MS, T0).is_ok());
        assert!(validate_start_not_past(T0 - START_TOLERANCE_MS, T0).is_ok());
        assert!(validate_start_not_past(T0 - START_TOLERANCE_MS - 1, T0).is_err());
        assert!(validate_start_not_past(T0 + DAY_MS, T0).is_ok());
    }

    #[test]
    fn text_limits() {
        assert!(validate_title("Lift hill chain").is_ok());
        assert!(validate_title("   ab   ").is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LEN)).is_ok());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LEN + 1)).is_err());
        assert!(validate_description(None).is_ok());
        assert!(validate_description(Some(&"d".repeat(MAX_DESCRIPTION_LEN + 1))).is_err());
        assert!(validate_created_by(Some(&"c".repeat(MAX_CREATED_BY_LEN))).is_ok());
        assert!(validate_created_by(Some(&"c".repeat(MAX_CREATED_BY_LEN + 1))).is_err());
    }

    #[test]
    fn conflicts_collect_all_overlapping_ids() {
        let a = active(T0, Some(T0 + 100));
        let b = active(T0 + 200, Some(T0 + 300));
        let c = active(T0 + 400, None);
        let windows = vec![a.clone(), b.clone(), c.clone()];

        let err = check_no_conflict(&windows, &Span::bounded(T0 + 50, T0 + 250), None).unwrap_err();
        match err {
            EngineError::Conflict(ids) => assert_eq!(ids, vec![a.id, b.id]),
            other => panic!("expected conflict, got {other:?}"),
        }

        // Open-ended window catches anything after its start.
        let far = Span::bounded(T0 + 10 * DAY_MS, T0 + 11 * DAY_MS);
        let hits: Vec<_> = find_conflicts(&windows, &far, None).map(|w| w.id).collect();
        assert_eq!(hits, vec![c.id]);
    }

    #[test]
    fn touching_windows_do_not_conflict() {
        let a = active(T0, Some(T0 + 100));
        assert!(check_no_conflict(&[a], &Span::bounded(T0 + 100, T0 + 200), None).is_ok());
    }

    #[test]
    fn excluded_window_is_ignored() {
        let a = active(T0, Some(T0 + 100));
        assert!(check_no_conflict(std::slice::from_ref(&a), &a.span, Some(a.id)).is_ok());
        assert!(check_no_conflict(std::slice::from_ref(&a), &a.span, None).is_err());
    }

    #[test]
    fn inactive_windows_never_conflict() {
        let mut a = active(T0, None);
        a.active = false;
        assert!(check_no_conflict(&[a], &Span::bounded(T0, T0 + 1), None).is_ok());
    }
}
