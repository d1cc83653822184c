// src/store.rs
//! Upsert-based cache of canonical events.
//!
//! The trait is the access pattern the rest of the service is written
//! against: batched idempotent upsert keyed by content id, range queries by
//! local date string (preferred) or UTC instant, latest-date introspection to
//! tell "never populated" from "nothing in this range", retention pruning and
//! a full clear. A relational backend would map `upsert` onto
//! INSERT .. ON CONFLICT DO UPDATE in ~100-row chunks; the in-process
//! implementation below holds one map under a mutex and optionally mirrors it
//! to a JSON snapshot file across restarts.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};

use crate::event::{CanonicalEvent, Impact};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot io: {0}")]
    Snapshot(#[from] std::io::Error),
    #[error("snapshot encode/decode: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Range + filter parameters for a cache lookup.
///
/// When both date-string bounds are present they take precedence over the
/// UTC instants: event dates are stored in source-local form, and instant
/// filtering shifts events across midnight for viewers in other zones.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub start_utc: Option<DateTime<Utc>>,
    pub end_utc: Option<DateTime<Utc>>,
    pub countries: Option<Vec<String>>,
    pub impacts: Option<Vec<Impact>>,
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert-or-update by id. Duplicate ids within one batch collapse to
    /// the last occurrence before anything is written. On conflict the
    /// identity fields (time, country, names) stay as they are — they are
    /// fixed by construction of the id — while date, timestamp, provider
    /// values, category and `fetched_at` are overwritten.
    /// Returns the number of distinct records written.
    async fn upsert(&self, events: Vec<CanonicalEvent>) -> Result<usize, StoreError>;

    /// Events matching the query, ordered by `event_timestamp` ascending.
    async fn query(&self, q: &EventQuery) -> Result<Vec<CanonicalEvent>, StoreError>;

    /// Maximum `date` across all rows, or None when the cache has never
    /// been populated.
    async fn latest_date(&self) -> Result<Option<String>, StoreError>;

    /// Delete rows dated before `today - days`. Returns how many went.
    async fn prune_older_than(&self, days: u32) -> Result<usize, StoreError>;

    /// Administrative full reset.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Process-memory store with an optional JSON snapshot file.
pub struct MemoryEventStore {
    inner: Mutex<HashMap<String, CanonicalEvent>>,
    snapshot: Option<PathBuf>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            snapshot: None,
        }
    }

    /// Load the snapshot at `path` if it exists; mirror every mutation back
    /// to it. Snapshot write failures are logged, never fatal — the cache
    /// can always be rebuilt by the next sweep.
    pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut map = HashMap::new();
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Vec<CanonicalEvent>>(&content) {
                Ok(events) => {
                    for ev in events {
                        map.insert(ev.id.clone(), ev);
                    }
                    info!(events = map.len(), path = %path.display(), "loaded event snapshot");
                }
                Err(e) => warn!(error = %e, path = %path.display(), "event snapshot unreadable, starting empty"),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, path = %path.display(), "event snapshot unreadable, starting empty"),
        }
        Self {
            inner: Mutex::new(map),
            snapshot: Some(path),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("event store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, map: &HashMap<String, CanonicalEvent>) {
        let Some(path) = &self.snapshot else { return };
        let mut events: Vec<&CanonicalEvent> = map.values().collect();
        events.sort_by(|a, b| a.id.cmp(&b.id));
        let result = serde_json::to_string(&events)
            .map_err(StoreError::from)
            .and_then(|json| {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)?;
                }
                std::fs::write(path, json).map_err(StoreError::from)
            });
        if let Err(e) = result {
            warn!(error = %e, path = %path.display(), "failed to write event snapshot");
        }
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn upsert(&self, events: Vec<CanonicalEvent>) -> Result<usize, StoreError> {
        if events.is_empty() {
            return Ok(0);
        }

        // Intra-batch dedup, last occurrence wins.
        let mut batch: HashMap<String, CanonicalEvent> = HashMap::with_capacity(events.len());
        for ev in events {
            batch.insert(ev.id.clone(), ev);
        }
        let written = batch.len();

        let now = Utc::now();
        let mut map = self.inner.lock().expect("event store mutex poisoned");
        for (id, mut incoming) in batch {
            incoming.fetched_at = now;
            match map.get_mut(&id) {
                Some(existing) => {
                    existing.date = incoming.date;
                    existing.event_timestamp = incoming.event_timestamp;
                    existing.actual = incoming.actual;
                    existing.forecast = incoming.forecast;
                    existing.previous = incoming.previous;
                    existing.category = incoming.category;
                    existing.fetched_at = now;
                }
                None => {
                    map.insert(id, incoming);
                }
            }
        }
        self.persist(&map);
        counter!("cache_events_upserted_total").increment(written as u64);
        Ok(written)
    }

    async fn query(&self, q: &EventQuery) -> Result<Vec<CanonicalEvent>, StoreError> {
        let map = self.inner.lock().expect("event store mutex poisoned");
        let mut out: Vec<CanonicalEvent> = map
            .values()
            .filter(|ev| {
                if let (Some(from), Some(to)) = (&q.from_date, &q.to_date) {
                    // Zero-padded YYYY-MM-DD sorts lexicographically.
                    if ev.date.as_str() < from.as_str() || ev.date.as_str() > to.as_str() {
                        return false;
                    }
                } else if let (Some(start), Some(end)) = (q.start_utc, q.end_utc) {
                    if ev.event_timestamp < start || ev.event_timestamp > end {
                        return false;
                    }
                }
                if let Some(countries) = &q.countries {
                    if !countries.is_empty() && !countries.contains(&ev.country) {
                        return false;
                    }
                }
                if let Some(impacts) = &q.impacts {
                    if !impacts.is_empty() && !impacts.contains(&ev.impact) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.event_timestamp
                .cmp(&b.event_timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(out)
    }

    async fn latest_date(&self) -> Result<Option<String>, StoreError> {
        let map = self.inner.lock().expect("event store mutex poisoned");
        Ok(map.values().map(|ev| ev.date.clone()).max())
    }

    async fn prune_older_than(&self, days: u32) -> Result<usize, StoreError> {
        let cutoff = (Utc::now().date_naive() - Duration::days(days as i64))
            .format("%Y-%m-%d")
            .to_string();
        let mut map = self.inner.lock().expect("event store mutex poisoned");
        let before = map.len();
        map.retain(|_, ev| ev.date >= cutoff);
        let removed = before - map.len();
        if removed > 0 {
            self.persist(&map);
            counter!("cache_events_pruned_total").increment(removed as u64);
            info!(removed, cutoff = %cutoff, "pruned aged-out events");
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut map = self.inner.lock().expect("event store mutex poisoned");
        map.clear();
        self.persist(&map);
        Ok(())
    }
}
