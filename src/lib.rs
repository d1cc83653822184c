// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod date_range;
pub mod event;
pub mod metrics;
pub mod notify;
pub mod query;
pub mod refresh;
pub mod scrape;
pub mod store;
pub mod taxonomy;
pub mod watchlist;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::ServiceConfig;
pub use crate::date_range::{resolve_range, Period, ResolvedRange, Window};
pub use crate::event::{CanonicalEvent, Impact};
pub use crate::query::{EventsRequest, QueryService};
pub use crate::refresh::{RefreshCoordinator, RefreshTuning};
pub use crate::scrape::{CalendarSource, ScrapeError, ScrapeTuning, Scraper};
pub use crate::store::{EventQuery, EventStore, MemoryEventStore};
