// src/refresh.rs
//! Refresh coordinator: decides when the scraper runs and owns all mutable
//! refresh state.
//!
//! One instance is constructed at startup and injected wherever it's needed;
//! there are no globals. The scraper can only safely drive one browser
//! session at a time, so a single async mutex serializes every refresh path
//! (bootstrap, nightly sweep, rolling intraday refresh). A job that loses
//! the lock re-queues itself after a delay instead of piling on.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::date_range::Window;
use crate::scrape::Scraper;
use crate::store::{EventStore, StoreError};

/// Windows covered by the nightly sweep. Last week is included so a cold
/// deployment still has some history on day zero.
const SWEEP_WINDOWS: &[Window] = &[
    Window::LastWeek,
    Window::Yesterday,
    Window::Today,
    Window::Tomorrow,
    Window::ThisWeek,
    Window::NextWeek,
];

/// Windows scraped synchronously when a query hits a never-populated cache.
const BOOTSTRAP_WINDOWS: &[Window] = &[Window::Yesterday, Window::Today, Window::Tomorrow];

/// Narrow intraday refresh, picking up `actual` values as they publish.
const ROLLING_WINDOWS: &[Window] = &[Window::Today, Window::Tomorrow];

#[derive(Debug, Error)]
pub enum RefreshError {
    /// A cold-start fill failed; the caller has no data to fall back to,
    /// so this one is not swallowed.
    #[error("cache bootstrap failed: {0}")]
    BootstrapFailed(String),
    /// Every window in the batch failed.
    #[error("all scrape windows failed")]
    AllWindowsFailed,
    /// Another refresh holds the lock; re-queue instead of running.
    #[error("another refresh is in progress")]
    Busy,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Scheduling knobs, surfaced in the service config.
#[derive(Debug, Clone, Copy)]
pub struct RefreshTuning {
    /// UTC hour of the nightly full sweep.
    pub sweep_hour_utc: u32,
    /// Cadence of the rolling intraday refresh.
    pub rolling_interval: Duration,
    /// How long a job that lost the refresh lock waits before retrying.
    pub requeue_delay: Duration,
    /// Rows older than this many days are pruned after each sweep.
    pub retention_days: u32,
    /// Age past which the cache is reported stale.
    pub staleness: Duration,
}

impl Default for RefreshTuning {
    fn default() -> Self {
        Self {
            sweep_hour_utc: 2,
            rolling_interval: Duration::from_secs(6 * 3600),
            requeue_delay: Duration::from_secs(30 * 60),
            retention_days: 180,
            staleness: Duration::from_secs(12 * 3600),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub is_refreshing: bool,
    pub last_refresh_unix: Option<i64>,
    pub last_refresh_age_minutes: Option<i64>,
    pub is_stale: bool,
}

pub struct RefreshCoordinator {
    store: Arc<dyn EventStore>,
    scraper: Arc<Scraper>,
    tuning: RefreshTuning,
    refresh_lock: tokio::sync::Mutex<()>,
    /// Unix seconds of the last successful refresh; 0 means never.
    last_refresh: AtomicI64,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<dyn EventStore>, scraper: Arc<Scraper>, tuning: RefreshTuning) -> Self {
        Self {
            store,
            scraper,
            tuning,
            refresh_lock: tokio::sync::Mutex::new(()),
            last_refresh: AtomicI64::new(0),
        }
    }

    /// Scrape a batch of windows sequentially through the shared browser
    /// session, upserting each window's events as they land. Individual
    /// window failures are logged and skipped; only a batch where every
    /// window failed is reported as an error.
    async fn run_windows(&self, windows: &[Window]) -> Result<usize, RefreshError> {
        let mut total = 0usize;
        let mut failures = 0usize;
        for (i, window) in windows.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.scraper.window_delay()).await;
            }
            match self.scraper.scrape(*window).await {
                Ok(events) => {
                    // A failed batch write never rolls back earlier windows;
                    // upsert is idempotent, so the next run re-covers this
                    // ground anyway.
                    let batch_size = events.len();
                    match self.store.upsert(events).await {
                        Ok(written) => total += written,
                        Err(e) => {
                            warn!(
                                target: "refresh",
                                window = window.as_str(),
                                batch_size,
                                error = %e,
                                "cache write failed for window"
                            );
                            failures += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        target: "refresh",
                        window = window.as_str(),
                        error = %e,
                        "window skipped after retries"
                    );
                    failures += 1;
                }
            }
        }
        if failures == windows.len() {
            return Err(RefreshError::AllWindowsFailed);
        }
        Ok(total)
    }

    /// First-population path, invoked from the query side when
    /// `latest_date()` is null. Double-checked under the refresh lock:
    /// concurrent callers queue on the same lock and find the cache
    /// populated instead of launching a second browser.
    pub async fn ensure_bootstrapped(&self) -> Result<(), RefreshError> {
        if self.store.latest_date().await?.is_some() {
            return Ok(());
        }
        let _guard = self.refresh_lock.lock().await;
        if self.store.latest_date().await?.is_some() {
            return Ok(());
        }

        info!(target: "refresh", "cache is empty, bootstrapping from the calendar source");
        match self.run_windows(BOOTSTRAP_WINDOWS).await {
            Ok(written) => {
                self.mark_refreshed();
                counter!("refresh_bootstrap_total").increment(1);
                info!(target: "refresh", events = written, "bootstrap complete");
                Ok(())
            }
            Err(e) => {
                counter!("refresh_bootstrap_failures_total").increment(1);
                Err(RefreshError::BootstrapFailed(e.to_string()))
            }
        }
    }

    /// Full multi-week sweep plus retention pruning. Intended for
    /// low-traffic hours.
    pub async fn sweep(&self) -> Result<usize, RefreshError> {
        let _guard = self.refresh_lock.try_lock().map_err(|_| RefreshError::Busy)?;
        info!(target: "refresh", "starting full calendar sweep");
        let written = self.run_windows(SWEEP_WINDOWS).await?;
        self.store
            .prune_older_than(self.tuning.retention_days)
            .await?;
        self.mark_refreshed();
        counter!("refresh_sweeps_total").increment(1);
        info!(target: "refresh", events = written, "sweep complete");
        Ok(written)
    }

    /// Narrow refresh of the active days.
    pub async fn refresh_rolling(&self) -> Result<usize, RefreshError> {
        let _guard = self.refresh_lock.try_lock().map_err(|_| RefreshError::Busy)?;
        let written = self.run_windows(ROLLING_WINDOWS).await?;
        self.mark_refreshed();
        counter!("refresh_rolling_total").increment(1);
        info!(target: "refresh", events = written, "rolling refresh complete");
        Ok(written)
    }

    pub fn status(&self) -> CacheStatus {
        let is_refreshing = self.refresh_lock.try_lock().is_err();
        let last = self.last_refresh.load(Ordering::Relaxed);
        let (last_refresh_unix, age_minutes) = if last > 0 {
            let age = (Utc::now().timestamp() - last).max(0);
            (Some(last), Some(age / 60))
        } else {
            (None, None)
        };
        let is_stale = age_minutes
            .map(|mins| mins as u64 * 60 > self.tuning.staleness.as_secs())
            .unwrap_or(true);
        CacheStatus {
            is_refreshing,
            last_refresh_unix,
            last_refresh_age_minutes: age_minutes,
            is_stale,
        }
    }

    fn mark_refreshed(&self) {
        let now = Utc::now().timestamp();
        self.last_refresh.store(now, Ordering::Relaxed);
        gauge!("refresh_last_run_ts").set(now as f64);
    }

    /// Spawn the background jobs. Failures are caught and logged at the job
    /// boundary; nothing here can take the process down or block the next
    /// scheduled run.
    pub fn spawn_jobs(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let sweep = {
            let coordinator = Arc::clone(self);
            tokio::spawn(async move {
                loop {
                    let wait = until_next_utc_hour(coordinator.tuning.sweep_hour_utc);
                    tokio::time::sleep(wait).await;
                    coordinator.run_job(Job::Sweep).await;
                }
            })
        };

        let rolling = {
            let coordinator = Arc::clone(self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(coordinator.tuning.rolling_interval);
                ticker.tick().await; // first tick fires immediately
                // On startup only refresh if the cache already has data;
                // an empty cache belongs to the bootstrap path.
                match coordinator.store.latest_date().await {
                    Ok(Some(_)) => coordinator.run_job(Job::Rolling).await,
                    Ok(None) => {
                        info!(target: "refresh", "skipping startup rolling refresh, cache never populated")
                    }
                    Err(e) => error!(target: "refresh", error = %e, "startup staleness check failed"),
                }
                loop {
                    ticker.tick().await;
                    coordinator.run_job(Job::Rolling).await;
                }
            })
        };

        vec![sweep, rolling]
    }

    async fn run(&self, job: Job) -> Result<usize, RefreshError> {
        match job {
            Job::Sweep => self.sweep().await,
            Job::Rolling => self.refresh_rolling().await,
        }
    }

    /// Run one scheduled job; on lock contention, re-queue once after the
    /// configured delay rather than dropping the run.
    async fn run_job(&self, job: Job) {
        match self.run(job).await {
            Ok(_) => {}
            Err(RefreshError::Busy) => {
                info!(
                    target: "refresh",
                    job = job.name(),
                    delay_secs = self.tuning.requeue_delay.as_secs(),
                    "refresh lock held, re-queuing job"
                );
                tokio::time::sleep(self.tuning.requeue_delay).await;
                if let Err(e) = self.run(job).await {
                    error!(target: "refresh", job = job.name(), error = %e, "re-queued job failed");
                }
            }
            Err(e) => error!(target: "refresh", job = job.name(), error = %e, "scheduled job failed"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Job {
    Sweep,
    Rolling,
}

impl Job {
    fn name(self) -> &'static str {
        match self {
            Job::Sweep => "sweep",
            Job::Rolling => "rolling",
        }
    }
}

/// Duration until the next occurrence of `hour:00` UTC.
fn until_next_utc_hour(hour: u32) -> Duration {
    let now = Utc::now();
    let today_at = now
        .date_naive()
        .and_hms_opt(hour.min(23), 0, 0)
        .expect("valid schedule hour");
    let mut next = today_at;
    if next <= now.naive_utc() {
        next = next + ChronoDuration::days(1);
    }
    (next - now.naive_utc())
        .to_std()
        .unwrap_or(Duration::from_secs(3600))
}
