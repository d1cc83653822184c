//! Economic Calendar Service — Binary Entrypoint
//! Boots the Axum HTTP server, wiring the cache store, scraper, refresh
//! coordinator and background jobs.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use econ_calendar::api::{create_router, AppState};
use econ_calendar::config::ServiceConfig;
use econ_calendar::metrics::Metrics;
use econ_calendar::notify::{spawn_notification_ticker, NotificationStore};
use econ_calendar::query::QueryService;
use econ_calendar::refresh::RefreshCoordinator;
use econ_calendar::scrape::{CalendarSource, Scraper};
use econ_calendar::store::{EventStore, MemoryEventStore};
use econ_calendar::watchlist::WatchlistStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("econ_calendar=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[cfg(feature = "browser")]
fn calendar_source(cfg: &ServiceConfig) -> Result<Arc<dyn CalendarSource>> {
    use econ_calendar::scrape::browser::{BrowserTuning, ChromiumSource};
    use std::time::Duration;

    let tuning = BrowserTuning {
        nav_timeout: Duration::from_secs(cfg.scrape.nav_timeout_secs),
        wait_timeout: Duration::from_secs(cfg.scrape.wait_timeout_secs),
        load_timeout: Duration::from_secs(cfg.scrape.load_timeout_secs),
    };
    Ok(Arc::new(ChromiumSource::new(
        cfg.source_url.clone(),
        cfg.source_tz(),
        tuning,
    )))
}

#[cfg(not(feature = "browser"))]
fn calendar_source(_cfg: &ServiceConfig) -> Result<Arc<dyn CalendarSource>> {
    anyhow::bail!("built without the `browser` feature; no calendar source available")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = ServiceConfig::load().context("loading service config")?;
    info!(
        source = %cfg.source_url,
        source_tz = %cfg.source_tz(),
        "starting econ-calendar v{}",
        env!("CARGO_PKG_VERSION")
    );

    let metrics = Metrics::init();

    let store: Arc<dyn EventStore> = match &cfg.snapshot_path {
        Some(path) => Arc::new(MemoryEventStore::with_snapshot(path)),
        None => Arc::new(MemoryEventStore::new()),
    };

    let source = calendar_source(&cfg)?;
    let scraper = Arc::new(Scraper::new(source, cfg.source_tz(), cfg.scrape_tuning()));
    let coordinator = Arc::new(RefreshCoordinator::new(
        store.clone(),
        scraper,
        cfg.refresh_tuning(),
    ));
    let _jobs = coordinator.spawn_jobs();

    let notifications = Arc::new(NotificationStore::new());
    let _ticker = spawn_notification_ticker(notifications.clone());

    let state = AppState {
        query: Arc::new(QueryService::new(store.clone(), coordinator.clone())),
        coordinator,
        store,
        notifications,
        watchlist: Arc::new(WatchlistStore::new()),
    };

    let router = create_router(state).merge(metrics.router());

    let addr: SocketAddr = cfg.bind_addr.parse().context("parsing bind_addr")?;
    info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
