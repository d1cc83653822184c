// tests/scrape_pipeline.rs
//
// End-to-end scraper pipeline over an HTML fixture: two date-separator rows,
// each followed by two event rows, with actual/forecast/previous values held
// in separate id-linked elements the way the source markup lays them out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use econ_calendar::date_range::Window;
use econ_calendar::scrape::{CalendarSource, ScrapeError, ScrapeTuning, Scraper};

const FIXTURE: &str = r##"
<html><body>
<table id="economicCalendarData"><tbody>
  <tr><td class="theDay">Lunes, 1 de enero de 2025</td></tr>
  <tr id="eventRowId_101">
    <td class="time">08:30</td>
    <td class="flagCur"><span class="ceFlags" title="Estados Unidos"></span> USD</td>
    <td class="event"><a>Nonfarm Payrolls</a></td>
    <td class="sentiment"><i class="grayFullBullishIcon"></i><i class="grayFullBullishIcon"></i><i class="grayFullBullishIcon"></i></td>
  </tr>
  <tr id="eventRowId_102">
    <td class="time">10:00</td>
    <td class="flagCur"><span class="ceFlags" title="Alemania"></span> EUR</td>
    <td class="event"><a>Ifo Business Climate</a></td>
    <td class="sentiment"><i class="grayFullBullishIcon"></i><i class="grayFullBullishIcon"></i></td>
  </tr>
  <tr><td class="theDay">Martes, 2 de enero de 2025</td></tr>
  <tr id="eventRowId_103">
    <td class="time">09:00</td>
    <td class="flagCur"><span class="ceFlags" title="Reino Unido"></span> GBP</td>
    <td class="event"><a>Unemployment Rate</a></td>
    <td class="sentiment"><i class="grayFullBullishIcon"></i><i class="grayFullBullishIcon"></i><i class="grayFullBullishIcon"></i></td>
  </tr>
  <tr id="eventRowId_104">
    <td class="time">14:30</td>
    <td class="flagCur"><span class="ceFlags" title="Japón"></span> JPY</td>
    <td class="event"><a>Trade Balance</a></td>
    <td class="sentiment"><i class="grayFullBullishIcon"></i><i class="grayFullBullishIcon"></i></td>
  </tr>
  <tr id="eventRowId_105">
    <td class="time">15:00</td>
    <td class="flagCur"><span class="ceFlags" title="Australia"></span> AUD</td>
    <td class="event"><a>RBA Rate Statement</a></td>
    <td class="sentiment"><i class="grayFullBullishIcon"></i></td>
  </tr>
</tbody></table>
<span id="eventActual_101">225K</span>
<span id="eventForecast_101">200K</span>
<span id="eventPrevious_101">190K</span>
<span id="eventForecast_102">86.5</span>
<span id="eventPrevious_102">87.1</span>
<span id="eventActual_103">4.3%</span>
<span id="eventPrevious_103">4.2%</span>
<span id="eventPrevious_104">-1.2B</span>
</body></html>
"##;

struct FixtureSource;

#[async_trait]
impl CalendarSource for FixtureSource {
    async fn fetch_window(&self, _window: Window) -> Result<String, ScrapeError> {
        Ok(FIXTURE.to_string())
    }
    fn name(&self) -> &'static str {
        "fixture"
    }
}

fn fixture_scraper() -> Scraper {
    let tuning = ScrapeTuning {
        attempts: 2,
        retry_backoff: Duration::from_millis(1),
        window_delay: Duration::ZERO,
    };
    Scraper::new(Arc::new(FixtureSource), chrono_tz::Europe::Madrid, tuning)
}

#[tokio::test]
async fn fixture_produces_four_events_with_attributed_dates() {
    let events = fixture_scraper().scrape(Window::ThisWeek).await.unwrap();

    // The AUD row is outside the tracked economies and must be discarded.
    assert_eq!(events.len(), 4);

    let by_name = |name: &str| {
        events
            .iter()
            .find(|e| e.event_original == name)
            .unwrap_or_else(|| panic!("missing event {name}"))
    };

    let nfp = by_name("Nonfarm Payrolls");
    assert_eq!(nfp.date, "2025-01-01");
    assert_eq!(nfp.country, "USA");
    assert_eq!(nfp.impact, econ_calendar::Impact::High);
    assert_eq!(nfp.actual.as_deref(), Some("225K"));
    assert_eq!(nfp.forecast.as_deref(), Some("200K"));
    assert_eq!(nfp.previous.as_deref(), Some("190K"));

    let ifo = by_name("Ifo Business Climate");
    assert_eq!(ifo.date, "2025-01-01");
    assert_eq!(ifo.country, "DEU");
    assert_eq!(ifo.impact, econ_calendar::Impact::Medium);
    assert_eq!(ifo.actual, None);
    assert_eq!(ifo.forecast.as_deref(), Some("86.5"));

    let unemployment = by_name("Unemployment Rate");
    assert_eq!(unemployment.date, "2025-01-02");
    assert_eq!(unemployment.country, "GBR");
    assert_eq!(unemployment.impact, econ_calendar::Impact::High);
    assert_eq!(unemployment.actual.as_deref(), Some("4.3%"));

    let trade = by_name("Trade Balance");
    assert_eq!(trade.date, "2025-01-02");
    assert_eq!(trade.country, "JPN");
    assert_eq!(trade.impact, econ_calendar::Impact::Medium);
    assert_eq!(trade.previous.as_deref(), Some("-1.2B"));
}

#[tokio::test]
async fn ids_are_stable_across_repeated_scrapes() {
    let scraper = fixture_scraper();
    let first = scraper.scrape(Window::ThisWeek).await.unwrap();
    let second = scraper.scrape(Window::ThisWeek).await.unwrap();

    let mut first_ids: Vec<String> = first.iter().map(|e| e.id.clone()).collect();
    let mut second_ids: Vec<String> = second.iter().map(|e| e.id.clone()).collect();
    first_ids.sort();
    second_ids.sort();
    assert_eq!(first_ids, second_ids);
    assert!(first_ids.iter().all(|id| id.len() == 32));
}

#[tokio::test]
async fn timestamps_come_out_in_utc_via_the_source_zone() {
    let events = fixture_scraper().scrape(Window::ThisWeek).await.unwrap();
    let nfp = events
        .iter()
        .find(|e| e.event_original == "Nonfarm Payrolls")
        .unwrap();
    // 08:30 Madrid winter time = 07:30 UTC.
    assert_eq!(nfp.time, "08:30:00");
    assert_eq!(nfp.event_timestamp.to_rfc3339(), "2025-01-01T07:30:00+00:00");
}

#[tokio::test]
async fn names_are_translated_and_categorized_at_ingestion() {
    let events = fixture_scraper().scrape(Window::ThisWeek).await.unwrap();
    let unemployment = events
        .iter()
        .find(|e| e.event_original == "Unemployment Rate")
        .unwrap();
    assert_eq!(unemployment.event, "Tasa de Desempleo");
    assert_eq!(unemployment.category.as_deref(), Some("employment"));

    let trade = events
        .iter()
        .find(|e| e.event_original == "Trade Balance")
        .unwrap();
    assert_eq!(trade.event, "Balanza Comercial");
    assert_eq!(trade.category.as_deref(), Some("trade"));
}
