// src/query.rs
//! Query service: the read path between the HTTP surface and the cache.
//!
//! Resolves the requested period to concrete bounds, queries the store, and
//! only reaches for the scraper in one case: the cache has never been
//! populated at all. An empty result from a populated cache is a legitimate
//! answer, not an error.

use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use metrics::counter;
use thiserror::Error;
use tracing::warn;

use crate::date_range::{resolve_range, Period};
use crate::event::{CanonicalEvent, Impact};
use crate::refresh::{RefreshCoordinator, RefreshError};
use crate::store::{EventQuery, EventStore, StoreError};
use crate::taxonomy;

#[derive(Debug, Error)]
pub enum QueryError {
    /// The cache was cold and the synchronous fill failed. Retryable by the
    /// caller once the source recovers.
    #[error("cache is warming up: {0}")]
    Bootstrap(#[from] RefreshError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default)]
pub struct EventsRequest {
    pub period: Period,
    /// IANA timezone of the viewer; invalid or missing values mean UTC.
    pub timezone: Option<String>,
    pub countries: Vec<String>,
    pub impacts: Vec<Impact>,
    pub categories: Vec<String>,
    pub search: Option<String>,
}

pub struct QueryService {
    store: Arc<dyn EventStore>,
    coordinator: Arc<RefreshCoordinator>,
}

impl QueryService {
    pub fn new(store: Arc<dyn EventStore>, coordinator: Arc<RefreshCoordinator>) -> Self {
        Self { store, coordinator }
    }

    pub async fn get_events(&self, req: &EventsRequest) -> Result<Vec<CanonicalEvent>, QueryError> {
        counter!("query_requests_total").increment(1);

        let tz = parse_timezone(req.timezone.as_deref());
        let range = resolve_range(req.period, tz, Utc::now());
        let store_query = EventQuery {
            from_date: Some(range.start_date),
            to_date: Some(range.end_date),
            start_utc: Some(range.start_utc),
            end_utc: Some(range.end_utc),
            countries: (!req.countries.is_empty()).then(|| req.countries.clone()),
            impacts: (!req.impacts.is_empty()).then(|| req.impacts.clone()),
        };

        let mut events = self.store.query(&store_query).await?;

        // Cold start: nothing in this range AND nothing anywhere means the
        // cache was never filled. Fill it synchronously and ask again; a
        // failure here surfaces instead of masquerading as "no events".
        if events.is_empty() && self.store.latest_date().await?.is_none() {
            self.coordinator.ensure_bootstrapped().await?;
            events = self.store.query(&store_query).await?;
        }

        if !req.categories.is_empty() {
            events.retain(|ev| matches_categories(ev, &req.categories));
        }
        if let Some(needle) = req.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = needle.to_lowercase();
            events.retain(|ev| {
                ev.event.to_lowercase().contains(&needle)
                    || ev.country.to_lowercase().contains(&needle)
                    || ev.country_name.to_lowercase().contains(&needle)
            });
        }

        Ok(events)
    }
}

/// Stored category first; otherwise re-derive the full category set from the
/// original name, since an event can match more categories than the one it
/// was filed under.
fn matches_categories(ev: &CanonicalEvent, requested: &[String]) -> bool {
    if let Some(stored) = &ev.category {
        if requested.iter().any(|c| c == stored) {
            return true;
        }
    }
    let derived = taxonomy::categorize(&ev.event_original);
    requested.iter().any(|c| derived.contains(&c.as_str()))
}

fn parse_timezone(tz: Option<&str>) -> Tz {
    match tz {
        None => chrono_tz::UTC,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(target: "query", timezone = raw, "unknown timezone, falling back to UTC");
            chrono_tz::UTC
        }),
    }
}
