// src/date_range.rs
//! Relative period → concrete bounds, in a caller-supplied timezone.
//!
//! Two kinds of bounds come out of a resolved range: UTC instants and local
//! `YYYY-MM-DD` date strings. The date strings are the authoritative filter
//! for "does this event fall in the requested period" — events carry their
//! date in source-local form, and filtering by UTC instants near midnight
//! shifts events into the wrong day for viewers west of the source.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Periods the query API accepts. Unknown input falls back to `Today`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    Yesterday,
    #[default]
    Today,
    Tomorrow,
    ThisWeek,
    NextWeek,
    ThisMonth,
}

impl Period {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "yesterday" => Period::Yesterday,
            "today" => Period::Today,
            "tomorrow" => Period::Tomorrow,
            "thisWeek" => Period::ThisWeek,
            "nextWeek" => Period::NextWeek,
            "thisMonth" => Period::ThisMonth,
            _ => Period::Today,
        }
    }
}

/// The unit of scraping. Mirrors the source site's timeframe controls, which
/// include last week (for backfill on day zero) but not a whole month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    LastWeek,
    Yesterday,
    Today,
    Tomorrow,
    ThisWeek,
    NextWeek,
}

impl Window {
    pub fn as_str(&self) -> &'static str {
        match self {
            Window::LastWeek => "lastWeek",
            Window::Yesterday => "yesterday",
            Window::Today => "today",
            Window::Tomorrow => "tomorrow",
            Window::ThisWeek => "thisWeek",
            Window::NextWeek => "nextWeek",
        }
    }

    /// Local first/last calendar day covered by this window, as seen from
    /// `tz` at instant `now`. Used to drive the source's date picker.
    pub fn local_bounds(&self, now: DateTime<Utc>, tz: Tz) -> (NaiveDate, NaiveDate) {
        let today = now.with_timezone(&tz).date_naive();
        let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        match self {
            Window::LastWeek => (monday - Duration::days(7), monday - Duration::days(1)),
            Window::Yesterday => {
                let d = today - Duration::days(1);
                (d, d)
            }
            Window::Today => (today, today),
            Window::Tomorrow => {
                let d = today + Duration::days(1);
                (d, d)
            }
            Window::ThisWeek => (monday, monday + Duration::days(6)),
            Window::NextWeek => (monday + Duration::days(7), monday + Duration::days(13)),
        }
    }

    /// Date attributed to rows whose separator never rendered. Single-day
    /// windows know their day; week windows fall back to today.
    pub fn base_date(&self, now: DateTime<Utc>, tz: Tz) -> NaiveDate {
        let today = now.with_timezone(&tz).date_naive();
        match self {
            Window::Yesterday => today - Duration::days(1),
            Window::Tomorrow => today + Duration::days(1),
            _ => today,
        }
    }
}

/// Resolved absolute bounds for a period.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRange {
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    /// Local `YYYY-MM-DD` bounds, inclusive. Prefer these for filtering.
    pub start_date: String,
    pub end_date: String,
}

/// Compute period boundaries in `tz`'s wall clock, then convert back to UTC.
/// Weeks run Monday–Sunday. Pure: `now` is always injected.
pub fn resolve_range(period: Period, tz: Tz, now: DateTime<Utc>) -> ResolvedRange {
    let today = now.with_timezone(&tz).date_naive();
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);

    let (start_day, end_day) = match period {
        Period::Yesterday => {
            let d = today - Duration::days(1);
            (d, d)
        }
        Period::Today => (today, today),
        Period::Tomorrow => {
            let d = today + Duration::days(1);
            (d, d)
        }
        Period::ThisWeek => (monday, monday + Duration::days(6)),
        Period::NextWeek => (monday + Duration::days(7), monday + Duration::days(13)),
        Period::ThisMonth => (first_of_month(today), last_of_month(today)),
    };

    let start_local = start_day.and_time(NaiveTime::MIN);
    let end_local = end_day.and_time(NaiveTime::from_hms_opt(23, 59, 59).expect("valid time"));

    ResolvedRange {
        start_utc: local_to_utc(tz, start_local),
        end_utc: local_to_utc(tz, end_local),
        start_date: start_day.format("%Y-%m-%d").to_string(),
        end_date: end_day.format("%Y-%m-%d").to_string(),
    }
}

/// Interpret a naive wall-clock datetime in `tz` and convert to UTC.
///
/// Ambiguous local times (DST fall-back) take the earlier offset. Times that
/// don't exist (spring-forward gap) are shifted one hour later, which is what
/// the clocks on the wall actually did.
pub fn local_to_utc(tz: Tz, local: chrono::NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = local + Duration::hours(1);
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
                LocalResult::None => Utc.from_utc_datetime(&local),
            }
        }
    }
}

fn first_of_month(d: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(d.year(), d.month(), 1).expect("valid first of month")
}

fn last_of_month(d: NaiveDate) -> NaiveDate {
    let (y, m) = if d.month() == 12 {
        (d.year() + 1, 1)
    } else {
        (d.year(), d.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
        .expect("valid first of next month")
        .pred_opt()
        .expect("valid last of month")
}
