// src/watchlist.rs
//! Per-session watchlists: pinned countries and pinned events. The session
//! id is an opaque partition key supplied by the client.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WatchedCountry {
    pub session_id: String,
    pub country_code: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WatchedEvent {
    pub session_id: String,
    pub event_id: String,
    pub added_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct WatchlistStore {
    countries: Mutex<Vec<WatchedCountry>>,
    events: Mutex<Vec<WatchedEvent>>,
}

impl WatchlistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn countries(&self, session_id: &str) -> Vec<WatchedCountry> {
        let list = self.countries.lock().expect("watchlist mutex poisoned");
        list.iter()
            .filter(|c| c.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Idempotent: re-adding an existing pin returns the stored entry.
    pub fn add_country(&self, session_id: &str, country_code: &str) -> WatchedCountry {
        let mut list = self.countries.lock().expect("watchlist mutex poisoned");
        if let Some(existing) = list
            .iter()
            .find(|c| c.session_id == session_id && c.country_code == country_code)
        {
            return existing.clone();
        }
        let entry = WatchedCountry {
            session_id: session_id.to_string(),
            country_code: country_code.to_string(),
            added_at: Utc::now(),
        };
        list.push(entry.clone());
        entry
    }

    pub fn remove_country(&self, session_id: &str, country_code: &str) -> bool {
        let mut list = self.countries.lock().expect("watchlist mutex poisoned");
        let before = list.len();
        list.retain(|c| !(c.session_id == session_id && c.country_code == country_code));
        list.len() != before
    }

    pub fn events(&self, session_id: &str) -> Vec<WatchedEvent> {
        let list = self.events.lock().expect("watchlist mutex poisoned");
        list.iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect()
    }

    pub fn add_event(&self, session_id: &str, event_id: &str) -> WatchedEvent {
        let mut list = self.events.lock().expect("watchlist mutex poisoned");
        if let Some(existing) = list
            .iter()
            .find(|e| e.session_id == session_id && e.event_id == event_id)
        {
            return existing.clone();
        }
        let entry = WatchedEvent {
            session_id: session_id.to_string(),
            event_id: event_id.to_string(),
            added_at: Utc::now(),
        };
        list.push(entry.clone());
        entry
    }

    pub fn remove_event(&self, session_id: &str, event_id: &str) -> bool {
        let mut list = self.events.lock().expect("watchlist mutex poisoned");
        let before = list.len();
        list.retain(|e| !(e.session_id == session_id && e.event_id == event_id));
        list.len() != before
    }
}
