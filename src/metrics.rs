use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder and register series descriptions.
    pub fn init() -> Self {
        // Use default buckets to avoid API differences across crate versions.
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        describe_metrics();

        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time series registration (so everything shows up on /metrics even
/// before the first increment).
pub fn describe_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scrape_windows_total", "Windows scraped successfully.");
        describe_counter!("scrape_events_total", "Events produced by the scraper.");
        describe_counter!("scrape_retries_total", "Scrape attempts that were retried.");
        describe_counter!("scrape_errors_total", "Windows that failed after retries.");
        describe_counter!(
            "cache_events_upserted_total",
            "Distinct event records written by upsert batches."
        );
        describe_counter!(
            "cache_events_pruned_total",
            "Rows removed by retention pruning."
        );
        describe_counter!("refresh_sweeps_total", "Completed full sweeps.");
        describe_counter!("refresh_rolling_total", "Completed rolling refreshes.");
        describe_counter!("refresh_bootstrap_total", "Completed cold-start bootstraps.");
        describe_counter!(
            "refresh_bootstrap_failures_total",
            "Cold-start bootstraps that failed."
        );
        describe_counter!("query_requests_total", "Event queries served.");
        describe_gauge!(
            "refresh_last_run_ts",
            "Unix ts of the last successful refresh."
        );
    });
}
