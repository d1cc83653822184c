// src/scrape/normalize.rs
//! Raw extracted rows → canonical events.
//!
//! Dates arrive as localized long-form labels, times as source-local wall
//! clock, countries as display names or currency codes. Normalization pins
//! all of that down: ISO date, HH:MM:SS, ISO-3 country, a UTC instant
//! derived through the source site's display timezone, translated name,
//! category, and the content-hash id.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::date_range::local_to_utc;
use crate::event::{event_id, CanonicalEvent, Impact};
use crate::taxonomy;

use super::extract::RawRow;

/// Economies the service tracks, by the source site's Spanish display names.
const TARGET_COUNTRIES: &[(&str, &str, &str)] = &[
    ("Estados Unidos", "USA", "United States"),
    ("EE.UU.", "USA", "United States"),
    ("Zona Euro", "EUR", "Eurozone"),
    ("Eurozona", "EUR", "Eurozone"),
    ("Alemania", "DEU", "Germany"),
    ("Francia", "FRA", "France"),
    ("España", "ESP", "Spain"),
    ("Reino Unido", "GBR", "United Kingdom"),
    ("China", "CHN", "China"),
    ("Japón", "JPN", "Japan"),
];

/// Currency-code fallback when the flag title is missing or unrecognized.
const TARGET_CURRENCIES: &[(&str, &str, &str)] = &[
    ("USD", "USA", "United States"),
    ("EUR", "EUR", "Eurozone"),
    ("GBP", "GBR", "United Kingdom"),
    ("JPY", "JPN", "Japan"),
    ("CNY", "CHN", "China"),
    ("RMB", "CHN", "China"),
];

const SPANISH_MONTHS: &[(&str, u32)] = &[
    ("enero", 1),
    ("febrero", 2),
    ("marzo", 3),
    ("abril", 4),
    ("mayo", 5),
    ("junio", 6),
    ("julio", 7),
    ("agosto", 8),
    ("septiembre", 9),
    ("octubre", 10),
    ("noviembre", 11),
    ("diciembre", 12),
];

static DATE_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})\s+de\s+(\p{L}+)\s+de\s+(\d{4})").expect("valid date regex"));

/// Map a row to the tracked economy it belongs to, or None to discard it.
///
/// Country labels are matched bidirectionally ("EE.UU." appears both
/// abbreviated and embedded in longer titles); currency is the fallback.
pub fn resolve_country(country_label: &str, currency: &str) -> Option<(&'static str, &'static str)> {
    let label = country_label.trim();
    if !label.is_empty() {
        for (name, code, display) in TARGET_COUNTRIES {
            if label.contains(name) || name.contains(label) {
                return Some((code, display));
            }
        }
    }
    TARGET_CURRENCIES
        .iter()
        .find(|(cur, _, _)| cur.eq_ignore_ascii_case(currency.trim()))
        .map(|(_, code, display)| (*code, *display))
}

/// Parse "Jueves, 24 de diciembre de 2025" (case-insensitive on the month).
pub fn parse_separator_date(label: &str) -> Option<NaiveDate> {
    let caps = DATE_LABEL_RE.captures(label)?;
    let day: u32 = caps[1].parse().ok()?;
    let month_name = caps[2].to_lowercase();
    let year: i32 = caps[3].parse().ok()?;
    let month = SPANISH_MONTHS
        .iter()
        .find(|(name, _)| *name == month_name)
        .map(|(_, m)| *m)?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// "8:30" / "14:05" → zero-padded HH:MM:SS; all-day markers and anything
/// non-clock-shaped become midnight.
pub fn parse_time(raw: &str) -> String {
    let raw = raw.trim();
    if let Some((h, m)) = raw.split_once(':') {
        if let (Ok(h), Ok(m)) = (h.trim().parse::<u32>(), m.trim().parse::<u32>()) {
            if h < 24 && m < 60 {
                return format!("{h:02}:{m:02}:00");
            }
        }
    }
    "00:00:00".to_string()
}

/// Normalize one extracted row. Returns None for rows outside the tracked
/// economies — they are discarded before ever reaching the cache.
pub fn normalize_row(
    raw: &RawRow,
    fallback_date: NaiveDate,
    source_tz: Tz,
    fetched_at: DateTime<Utc>,
) -> Option<CanonicalEvent> {
    let (country, country_name) = resolve_country(&raw.country_label, &raw.currency)?;

    let date = raw
        .date_label
        .as_deref()
        .and_then(parse_separator_date)
        .unwrap_or(fallback_date);
    let time = parse_time(&raw.time);

    // The scraped wall clock is in the source site's display timezone;
    // interpret it there and store the UTC instant alongside.
    let naive = date.and_time(
        chrono::NaiveTime::parse_from_str(&time, "%H:%M:%S").expect("normalized time is valid"),
    );
    let event_timestamp = local_to_utc(source_tz, naive);

    let date_str = date.format("%Y-%m-%d").to_string();
    let event_original = raw.name.clone();
    let event = taxonomy::translate(&event_original);
    let category = taxonomy::primary_category(&event_original).map(str::to_string);

    Some(CanonicalEvent {
        id: event_id(&date_str, &time, country, &event_original),
        event_timestamp,
        date: date_str,
        time,
        country: country.to_string(),
        country_name: country_name.to_string(),
        event,
        event_original,
        impact: Impact::from_icon_count(raw.bull_icons),
        actual: raw.actual.clone(),
        forecast: raw.forecast.clone(),
        previous: raw.previous.clone(),
        category,
        fetched_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(country_label: &str, currency: &str) -> RawRow {
        RawRow {
            row_id: "1".into(),
            date_label: Some("Miércoles, 24 de Diciembre de 2025".into()),
            time: "14:30".into(),
            currency: currency.into(),
            country_label: country_label.into(),
            name: "Consumer Price Index".into(),
            bull_icons: 3,
            actual: Some("2.9%".into()),
            forecast: None,
            previous: Some("3.1%".into()),
        }
    }

    #[test]
    fn separator_dates_parse_case_insensitively() {
        assert_eq!(
            parse_separator_date("Jueves, 24 de diciembre de 2025"),
            NaiveDate::from_ymd_opt(2025, 12, 24)
        );
        assert_eq!(
            parse_separator_date("Lunes, 1 de Enero de 2025"),
            NaiveDate::from_ymd_opt(2025, 1, 1)
        );
        assert_eq!(parse_separator_date("sin fecha"), None);
    }

    #[test]
    fn times_are_zero_padded_and_all_day_becomes_midnight() {
        assert_eq!(parse_time("8:30"), "08:30:00");
        assert_eq!(parse_time("14:05"), "14:05:00");
        assert_eq!(parse_time("Todo el día"), "00:00:00");
        assert_eq!(parse_time(""), "00:00:00");
    }

    #[test]
    fn unmatched_economies_are_discarded() {
        assert!(resolve_country("Australia", "AUD").is_none());
        let row = raw("Australia", "AUD");
        let out = normalize_row(
            &row,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            chrono_tz::Europe::Madrid,
            Utc::now(),
        );
        assert!(out.is_none());
    }

    #[test]
    fn currency_fallback_kicks_in_without_a_flag_title() {
        assert_eq!(resolve_country("", "JPY"), Some(("JPN", "Japan")));
        assert_eq!(resolve_country("", "rmb"), Some(("CHN", "China")));
    }

    #[test]
    fn wall_clock_is_interpreted_in_the_source_timezone() {
        let row = raw("Estados Unidos", "USD");
        let ev = normalize_row(
            &row,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            chrono_tz::Europe::Madrid,
            Utc::now(),
        )
        .unwrap();
        // 14:30 Madrid winter time is 13:30 UTC.
        assert_eq!(ev.date, "2025-12-24");
        assert_eq!(ev.time, "14:30:00");
        assert_eq!(
            ev.event_timestamp,
            "2025-12-24T13:30:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(ev.country, "USA");
        assert_eq!(ev.event_original, "Consumer Price Index");
        assert_eq!(ev.event, "Índice de Precios al Consumidor");
        assert_eq!(ev.category.as_deref(), Some("inflation"));
        assert_eq!(ev.impact, Impact::High);
    }

    #[test]
    fn missing_separator_uses_the_window_fallback_date() {
        let mut row = raw("Estados Unidos", "USD");
        row.date_label = None;
        let fallback = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        let ev = normalize_row(&row, fallback, chrono_tz::Europe::Madrid, Utc::now()).unwrap();
        assert_eq!(ev.date, "2025-03-09");
    }
}
