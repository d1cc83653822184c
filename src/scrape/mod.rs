// src/scrape/mod.rs
//! Scraper engine: drive a calendar source for a relative window and turn
//! what it returns into canonical events.
//!
//! The engine itself never touches a browser. `CalendarSource` yields an
//! HTML snapshot per window; the Chromium-backed implementation lives in
//! `browser.rs` (feature `browser`), and tests substitute fixture sources.

#[cfg(feature = "browser")]
pub mod browser;
pub mod extract;
pub mod normalize;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use metrics::counter;
use thiserror::Error;
use tracing::warn;

use crate::date_range::Window;
use crate::event::CanonicalEvent;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// A bounded wait expired. Transient; retried within the attempt budget.
    #[error("timed out after {timeout_secs}s waiting for {what}")]
    Timeout { what: String, timeout_secs: u64 },
    /// Expected DOM elements are gone — the source layout changed and the
    /// selector contract needs updating. Distinct from timeouts in logs.
    #[error("calendar structure changed: {0}")]
    Structure(String),
    /// Browser process / protocol failure.
    #[error("browser failure: {0}")]
    Browser(String),
}

/// Produces an HTML snapshot of the calendar table for one window.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn fetch_window(&self, window: Window) -> Result<String, ScrapeError>;
    fn name(&self) -> &'static str;
}

/// Retry/pacing knobs, surfaced in the service config.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeTuning {
    /// Attempts per window before giving up.
    pub attempts: u32,
    /// Pause between attempts of the same window.
    pub retry_backoff: Duration,
    /// Courtesy pause between windows in a sweep, seconds-scale so the
    /// source's own throttling can settle.
    pub window_delay: Duration,
}

impl Default for ScrapeTuning {
    fn default() -> Self {
        Self {
            attempts: 2,
            retry_backoff: Duration::from_secs(5),
            window_delay: Duration::from_secs(3),
        }
    }
}

pub struct Scraper {
    source: Arc<dyn CalendarSource>,
    source_tz: Tz,
    tuning: ScrapeTuning,
}

impl Scraper {
    pub fn new(source: Arc<dyn CalendarSource>, source_tz: Tz, tuning: ScrapeTuning) -> Self {
        Self {
            source,
            source_tz,
            tuning,
        }
    }

    pub fn window_delay(&self) -> Duration {
        self.tuning.window_delay
    }

    /// Scrape one window, retrying failed attempts within the budget.
    pub async fn scrape(&self, window: Window) -> Result<Vec<CanonicalEvent>, ScrapeError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.scrape_once(window).await {
                Ok(events) => {
                    counter!("scrape_windows_total").increment(1);
                    counter!("scrape_events_total").increment(events.len() as u64);
                    return Ok(events);
                }
                Err(e) if attempt < self.tuning.attempts => {
                    warn!(
                        target: "scrape",
                        window = window.as_str(),
                        attempt,
                        error = %e,
                        "scrape attempt failed, retrying"
                    );
                    counter!("scrape_retries_total").increment(1);
                    tokio::time::sleep(self.tuning.retry_backoff).await;
                }
                Err(e) => {
                    counter!("scrape_errors_total").increment(1);
                    return Err(e);
                }
            }
        }
    }

    async fn scrape_once(&self, window: Window) -> Result<Vec<CanonicalEvent>, ScrapeError> {
        let html = self.source.fetch_window(window).await?;
        let rows = extract::extract_raw_rows(&html)?;

        let now = Utc::now();
        let fallback_date = window.base_date(now, self.source_tz);
        let events: Vec<CanonicalEvent> = rows
            .iter()
            .filter_map(|row| normalize::normalize_row(row, fallback_date, self.source_tz, now))
            .collect();

        tracing::debug!(
            target: "scrape",
            window = window.as_str(),
            extracted = rows.len(),
            kept = events.len(),
            source = self.source.name(),
            "window scraped"
        );
        Ok(events)
    }
}
