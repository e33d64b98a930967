use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::model::{Day, DayRange, Ms};

/// Days shown after today.
pub const FUTURE_DAYS: usize = 365;

/// Days shown before today when history is on.
pub const PAST_WHEN_HISTORY_ON: usize = 90;

/// The visible day sequence plus the position of today inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarRange {
    pub days: Vec<Day>,
    pub today_index: usize,
}

impl CalendarRange {
    pub fn first(&self) -> Option<Day> {
        self.days.first().copied()
    }

    pub fn last(&self) -> Option<Day> {
        self.days.last().copied()
    }
}

/// Build the calendar window around `today`.
///
/// History off: `[today, today + FUTURE_DAYS]`.
/// History on: `[today - PAST_WHEN_HISTORY_ON, today + FUTURE_DAYS]`.
pub fn build_range(today: Day, history_enabled: bool) -> CalendarRange {
    let (past, today_index) = if history_enabled {
        (PAST_WHEN_HISTORY_ON, PAST_WHEN_HISTORY_ON)
    } else {
        (0, 0)
    };
    let start = today - Duration::days(past as i64);
    let total = past + FUTURE_DAYS + 1;
    let days = start.iter_days().take(total).collect();
    CalendarRange { days, today_index }
}

pub fn month_start(anchor: Day) -> Day {
    anchor.with_day(1).unwrap_or(anchor)
}

pub fn month_end(anchor: Day) -> Day {
    let (y, m) = if anchor.month() == 12 {
        (anchor.year() + 1, 1)
    } else {
        (anchor.year(), anchor.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
        .and_then(|next| next.pred_opt())
        .unwrap_or(anchor)
}

/// The whole month containing `anchor` as an inclusive range.
pub fn month_range(anchor: Day) -> DayRange {
    DayRange::new(month_start(anchor), month_end(anchor))
}

pub fn month_days(anchor: Day) -> impl Iterator<Item = Day> {
    let end = month_end(anchor);
    month_start(anchor).iter_days().take_while(move |d| *d <= end)
}

pub fn days_in_month(anchor: Day) -> u32 {
    month_end(anchor).day()
}

/// Store encoding: unix milliseconds of UTC midnight.
pub fn day_to_ms(day: Day) -> Ms {
    day.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0)
}

/// Any instant inside a day maps to that day; the time of day is dropped.
pub fn day_from_ms(ms: Ms) -> Option<Day> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn day_from_str(raw: &str) -> Option<Day> {
    let raw = raw.trim();
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(day);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).date_naive())
}

pub fn today_utc() -> Day {
    Utc::now().date_naive()
}

pub fn now_ms() -> Ms {
    Utc::now().timestamp_millis()
}
