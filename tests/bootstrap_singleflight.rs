// tests/bootstrap_singleflight.rs
//
// Cold-start semantics of the refresh coordinator through the query path:
// - an empty cache triggers exactly one bootstrap batch,
// - a concurrent query during the bootstrap rides the same in-flight work,
// - an empty period against a populated cache never touches the scraper,
// - a failed bootstrap surfaces instead of returning a misleading empty list.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use econ_calendar::date_range::Window;
use econ_calendar::query::{EventsRequest, QueryError, QueryService};
use econ_calendar::refresh::{RefreshCoordinator, RefreshTuning};
use econ_calendar::scrape::{CalendarSource, ScrapeError, ScrapeTuning, Scraper};
use econ_calendar::store::{EventStore, MemoryEventStore};
use econ_calendar::{CanonicalEvent, Impact};

const SPANISH_MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Calendar snapshot whose separator carries today's date, so the
/// bootstrapped rows land inside a "today" query.
fn today_fixture() -> String {
    let today = Utc::now().date_naive();
    let label = format!(
        "Lunes, {} de {} de {}",
        today.day(),
        SPANISH_MONTHS[today.month0() as usize],
        today.year()
    );
    format!(
        r##"<table id="economicCalendarData"><tbody>
          <tr><td class="theDay">{label}</td></tr>
          <tr id="eventRowId_1">
            <td class="time">08:30</td>
            <td class="flagCur"><span class="ceFlags" title="Estados Unidos"></span> USD</td>
            <td class="event"><a>Consumer Price Index</a></td>
            <td class="sentiment"><i class="grayFullBullishIcon"></i><i class="grayFullBullishIcon"></i><i class="grayFullBullishIcon"></i></td>
          </tr>
        </tbody></table>"##
    )
}

struct CountingSource {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingSource {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }
    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }
}

#[async_trait]
impl CalendarSource for CountingSource {
    async fn fetch_window(&self, _window: Window) -> Result<String, ScrapeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ScrapeError::Structure("table went missing".into()));
        }
        // Give the concurrent caller a chance to pile onto the lock.
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(today_fixture())
    }
    fn name(&self) -> &'static str {
        "counting-fixture"
    }
}

fn service(source: Arc<CountingSource>) -> (QueryService, Arc<dyn EventStore>) {
    let store: Arc<dyn EventStore> = Arc::new(MemoryEventStore::new());
    let tuning = ScrapeTuning {
        attempts: 1,
        retry_backoff: Duration::from_millis(1),
        window_delay: Duration::ZERO,
    };
    let scraper = Arc::new(Scraper::new(
        source,
        chrono_tz::Europe::Madrid,
        tuning,
    ));
    let coordinator = Arc::new(RefreshCoordinator::new(
        store.clone(),
        scraper,
        RefreshTuning::default(),
    ));
    (QueryService::new(store.clone(), coordinator), store)
}

/// Bootstrap covers yesterday/today/tomorrow — three source fetches, once.
const BOOTSTRAP_FETCHES: usize = 3;

#[tokio::test]
async fn cold_start_triggers_one_bootstrap_batch() {
    let source = CountingSource::ok();
    let (service, _store) = service(source.clone());

    let events = service.get_events(&EventsRequest::default()).await.unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), BOOTSTRAP_FETCHES);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_original, "Consumer Price Index");

    // A second query finds the cache populated; no further scraping.
    let again = service.get_events(&EventsRequest::default()).await.unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), BOOTSTRAP_FETCHES);
    assert_eq!(again.len(), 1);
}

#[tokio::test]
async fn concurrent_cold_queries_share_one_bootstrap() {
    let source = CountingSource::ok();
    let (service, _store) = service(source.clone());
    let service = Arc::new(service);

    let a = {
        let s = service.clone();
        tokio::spawn(async move { s.get_events(&EventsRequest::default()).await })
    };
    let b = {
        let s = service.clone();
        tokio::spawn(async move { s.get_events(&EventsRequest::default()).await })
    };
    let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

    assert_eq!(source.calls.load(Ordering::SeqCst), BOOTSTRAP_FETCHES);
    assert_eq!(a.len(), 1);
    assert_eq!(b.len(), 1);
}

#[tokio::test]
async fn empty_period_on_populated_cache_is_not_an_error_and_never_scrapes() {
    let source = CountingSource::ok();
    let (service, store) = service(source.clone());

    // Populate with an event far in the past.
    store
        .upsert(vec![CanonicalEvent {
            id: "a".repeat(32),
            event_timestamp: "2025-01-01T09:00:00Z".parse().unwrap(),
            date: "2025-01-01".into(),
            time: "09:00:00".into(),
            country: "USA".into(),
            country_name: "United States".into(),
            event: "PIB".into(),
            event_original: "GDP".into(),
            impact: Impact::High,
            actual: None,
            forecast: None,
            previous: None,
            category: Some("gdp".into()),
            fetched_at: Utc::now(),
        }])
        .await
        .unwrap();

    let events = service.get_events(&EventsRequest::default()).await.unwrap();
    assert!(events.is_empty());
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_bootstrap_surfaces_as_a_retryable_error() {
    let source = CountingSource::failing();
    let (service, _store) = service(source.clone());

    let err = service.get_events(&EventsRequest::default()).await.unwrap_err();
    assert!(matches!(err, QueryError::Bootstrap(_)));
    // All three windows were attempted before giving up.
    assert_eq!(source.calls.load(Ordering::SeqCst), BOOTSTRAP_FETCHES);
}
