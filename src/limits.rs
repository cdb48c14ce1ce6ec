use crate::model::{Ms, DAY_MS, MINUTE_MS};

/// 2000-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
/// 2100-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// How far in the past a new window may start.
pub const START_TOLERANCE_MS: Ms = 5 * MINUTE_MS;
/// A window blocks its resource this long before its nominal start.
pub const BLOCKING_LOOKAHEAD_MS: Ms = MINUTE_MS;

pub const MIN_TITLE_LEN: usize = 5;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_CREATED_BY_LEN: usize = 100;

pub const DEFAULT_UPCOMING_DAYS: u32 = 7;
pub const MAX_HORIZON_MS: Ms = 3650 * DAY_MS;
