use serde::Deserialize;
use time::{Date, Duration, Month, OffsetDateTime};
use tracing::warn;

/// Trailing window used when neither dates nor a month are given.
pub const DEFAULT_TRAILING_DAYS: i64 = 20;

/// Inclusive date range passed to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Date,
    pub end: Date,
}

/// Event-style trigger input; the CLI flags build the same shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TriggerEvent {
    #[serde(default, with = "iso_date::option")]
    pub start_date: Option<Date>,
    #[serde(default, with = "iso_date::option")]
    pub end_date: Option<Date>,
    /// Whole calendar months back from the current one.
    #[serde(default)]
    pub months: Option<u32>,
}

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

impl TriggerEvent {
    /// Explicit dates win field by field, then the month selector, then the trailing default.
    pub fn resolve(&self, today: Date) -> DateWindow {
        let fallback = match self.months {
            Some(offset) => month_window(today, offset),
            None => trailing_window(today, DEFAULT_TRAILING_DAYS),
        };

        let window = DateWindow {
            start: self.start_date.unwrap_or(fallback.start),
            end: self.end_date.unwrap_or(fallback.end),
        };
        if window.start > window.end {
            warn!(start = %window.start, end = %window.end, "Start date is after end date");
        }
        window
    }
}

pub fn trailing_window(today: Date, days: i64) -> DateWindow {
    DateWindow {
        start: today.saturating_sub(Duration::days(days)),
        end: today,
    }
}

/// Month 0 runs from the first of this month to today; earlier months are whole.
pub fn month_window(today: Date, offset: u32) -> DateWindow {
    let mut year = today.year();
    let mut month = today.month();
    for _ in 0..offset {
        if month == Month::January {
            year -= 1;
        }
        month = month.previous();
    }

    let first = first_of_month(year, month).unwrap_or(today);
    let end = if offset == 0 {
        today
    } else {
        let next_year = if month == Month::December { year + 1 } else { year };
        first_of_month(next_year, month.next())
            .map(|next| next - Duration::days(1))
            .unwrap_or(today)
    };
    DateWindow { start: first, end }
}

fn first_of_month(year: i32, month: Month) -> Option<Date> {
    Date::from_calendar_date(year, month, 1).ok()
}

/// Local date, falling back to UTC when the offset is unavailable.
pub fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}
