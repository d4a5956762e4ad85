//! Fetch window selection
//!
//! The remote export is queried in a fixed UTC+7 civil clock (no DST), so
//! both bounds are computed in that offset and rendered at second precision.

use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};

/// Offset of the export clock (Asia/Ho_Chi_Minh, constant UTC+7)
pub const WINDOW_OFFSET_HOURS: i64 = 7;

/// Format used for both bounds when talking to the remote API
pub const WINDOW_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Shared `[from, to]` interval for one run, in UTC+7 civil time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl TimeWindow {
    pub fn from_param(&self) -> String {
        self.from.format(WINDOW_FORMAT).to_string()
    }

    pub fn to_param(&self) -> String {
        self.to.format(WINDOW_FORMAT).to_string()
    }
}

/// Window ending now, spanning `lookback_hours`
pub fn select_window(lookback_hours: u32) -> TimeWindow {
    select_window_at(Utc::now(), lookback_hours)
}

/// Window ending at `now`
pub fn select_window_at(now: DateTime<Utc>, lookback_hours: u32) -> TimeWindow {
    let local = now.naive_utc() + Duration::hours(WINDOW_OFFSET_HOURS);
    let to = local.with_nanosecond(0).unwrap_or(local);
    // Saturates at the earliest representable instant instead of overflowing
    let from = to
        .checked_sub_signed(Duration::hours(i64::from(lookback_hours)))
        .unwrap_or(NaiveDateTime::MIN);
    TimeWindow { from, to }
}
