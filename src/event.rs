// src/event.rs
//! Canonical event record and its content-derived identity.
//!
//! The calendar source does not expose a reliable upstream id, so records are
//! keyed by a hash of their defining fields. The same (date, time, country,
//! original name) always hashes to the same id, which is what makes the cache
//! upsert idempotent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Impact level of a macro release, derived from the source's sentiment icons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Impact {
    /// 3 filled icons → high, 2 → medium, anything else → low.
    pub fn from_icon_count(count: usize) -> Self {
        match count {
            3 => Impact::High,
            2 => Impact::Medium,
            _ => Impact::Low,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Impact::High),
            "medium" => Some(Impact::Medium),
            "low" => Some(Impact::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::High => "high",
            Impact::Medium => "medium",
            Impact::Low => "low",
        }
    }
}

/// One cached macro-calendar event.
///
/// `date` and `time` are kept exactly as scraped, in the source site's display
/// timezone; `event_timestamp` is the same wall-clock instant converted to UTC.
/// `event_original` is the source-language name and is the input for
/// categorization; `event` is the translated display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEvent {
    pub id: String,
    pub event_timestamp: DateTime<Utc>,
    /// Source-local date, `YYYY-MM-DD`.
    pub date: String,
    /// Source-local time, `HH:MM:SS`.
    pub time: String,
    /// ISO-3 country code (EUR for the Eurozone aggregate).
    pub country: String,
    pub country_name: String,
    pub event: String,
    pub event_original: String,
    pub impact: Impact,
    pub actual: Option<String>,
    pub forecast: Option<String>,
    pub previous: Option<String>,
    pub category: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// Deterministic id from the fields that define an event's identity.
///
/// SHA-256 over `"{date}-{time}-{country}-{name}"`, hex, truncated to 32
/// chars. Provider-side values (actual/forecast/previous) are deliberately
/// excluded so a re-scrape of the same release updates in place.
pub fn event_id(date: &str, time: &str, country: &str, event_original: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{date}-{time}-{country}-{event_original}").as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_is_stable_and_32_hex_chars() {
        let a = event_id("2025-03-10", "14:30:00", "USA", "Consumer Price Index");
        let b = event_id("2025-03-10", "14:30:00", "USA", "Consumer Price Index");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn event_id_changes_with_any_identity_field() {
        let base = event_id("2025-03-10", "14:30:00", "USA", "CPI");
        assert_ne!(base, event_id("2025-03-11", "14:30:00", "USA", "CPI"));
        assert_ne!(base, event_id("2025-03-10", "15:30:00", "USA", "CPI"));
        assert_ne!(base, event_id("2025-03-10", "14:30:00", "EUR", "CPI"));
        assert_ne!(base, event_id("2025-03-10", "14:30:00", "USA", "PPI"));
    }

    #[test]
    fn impact_from_icons() {
        assert_eq!(Impact::from_icon_count(3), Impact::High);
        assert_eq!(Impact::from_icon_count(2), Impact::Medium);
        assert_eq!(Impact::from_icon_count(1), Impact::Low);
        assert_eq!(Impact::from_icon_count(0), Impact::Low);
        assert_eq!(Impact::from_icon_count(4), Impact::Low);
    }

    #[test]
    fn impact_wire_names_are_lowercase() {
        assert_eq!(serde_json::to_string(&Impact::High).unwrap(), "\"high\"");
        assert_eq!(Impact::parse("MEDIUM"), Some(Impact::Medium));
        assert_eq!(Impact::parse("none"), None);
    }
}
