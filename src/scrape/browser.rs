// src/scrape/browser.rs
//! Chromium-backed calendar source.
//!
//! Drives a fresh headless browser per window over CDP. The page is a
//! JS-rendered single-page calendar, so script and document requests must go
//! through; only heavy static assets (images, fonts, stylesheets) are
//! blocked. The emulated timezone is pinned to the source site's display
//! timezone — extracted times are interpreted in that zone downstream, and a
//! drifting emulation would silently corrupt every timestamp.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::SetBlockedUrLsParams;
use chromiumoxide::Page;
use chrono::Utc;
use chrono_tz::Tz;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::date_range::Window;

use super::{CalendarSource, ScrapeError};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Static-asset patterns blocked before navigation. Scripts and documents
/// are never on this list — the table only exists after JS runs.
const BLOCKED_URL_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.svg", "*.ico", "*.woff", "*.woff2",
    "*.ttf", "*.otf", "*.css",
];

/// Overlays that intercept clicks on the filter controls.
const OVERLAY_SELECTORS: &[&str] = &[
    "#PromoteSignUpPopUp",
    "#onetrust-consent-sdk",
    ".popupOverlay",
    ".generalOverlay",
    ".largeBannerCloser",
    "#closeIconHome",
];

const TABLE_ROOT_CSS: &str = "#economicCalendarData";
const READY_JS: &str = "!document.querySelector('#economicCalendarData .loadingDiv') \
     && !!document.querySelector('#economicCalendarData tbody tr')";

/// The site's internal ids for the tracked economies' filter checkboxes.
const COUNTRY_FILTER_IDS: &[u32] = &[5, 72, 17, 22, 26, 4, 37, 35];

/// Category filter labels as the site displays them.
const CATEGORY_FILTER_LABELS: &[&str] = &[
    "Empleo",
    "Actividad económica",
    "Inflación",
    "Crédito",
    "Banco central",
    "Índice de confianza",
    "Balance",
    "Bonos",
];

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Bounded-wait knobs for the browser session.
#[derive(Debug, Clone, Copy)]
pub struct BrowserTuning {
    /// Whole-page navigation budget.
    pub nav_timeout: Duration,
    /// Wait for the table root to exist in the DOM.
    pub wait_timeout: Duration,
    /// Wait for the async reload after applying the date range.
    pub load_timeout: Duration,
}

impl Default for BrowserTuning {
    fn default() -> Self {
        Self {
            nav_timeout: Duration::from_secs(90),
            wait_timeout: Duration::from_secs(15),
            load_timeout: Duration::from_secs(30),
        }
    }
}

pub struct ChromiumSource {
    url: String,
    source_tz: Tz,
    tuning: BrowserTuning,
}

impl ChromiumSource {
    pub fn new(url: impl Into<String>, source_tz: Tz, tuning: BrowserTuning) -> Self {
        Self {
            url: url.into(),
            source_tz,
            tuning,
        }
    }

    async fn drive(&self, browser: &Browser, window: Window) -> Result<String, ScrapeError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(browser_err)?;

        page.execute(SetBlockedUrLsParams {
            urls: BLOCKED_URL_PATTERNS.iter().map(|p| p.to_string()).collect(),
        })
        .await
        .map_err(browser_err)?;
        page.execute(SetTimezoneOverrideParams {
            timezone_id: self.source_tz.name().to_string(),
        })
        .await
        .map_err(browser_err)?;
        page.set_user_agent(USER_AGENT).await.map_err(browser_err)?;

        tokio::time::timeout(self.tuning.nav_timeout, page.goto(self.url.as_str()))
            .await
            .map_err(|_| ScrapeError::Timeout {
                what: "calendar page navigation".into(),
                timeout_secs: self.tuning.nav_timeout.as_secs(),
            })?
            .map_err(browser_err)?;

        self.wait_for_selector(&page, TABLE_ROOT_CSS, self.tuning.wait_timeout)
            .await?;

        self.dismiss_overlays(&page).await;
        self.apply_site_filters(&page).await;
        self.apply_date_range(&page, window).await?;
        self.wait_until_loaded(&page).await?;

        page.content().await.map_err(browser_err)
    }

    /// Remove known popups/consent banners so later clicks land.
    async fn dismiss_overlays(&self, page: &Page) {
        let selectors = serde_json::to_string(OVERLAY_SELECTORS).expect("static list serializes");
        let js = format!(
            "(() => {{ let n = 0; for (const s of {selectors}) \
             document.querySelectorAll(s).forEach(el => {{ el.remove(); n++; }}); return n; }})()"
        );
        match page.evaluate(js).await {
            Ok(result) => {
                let removed: i64 = result.into_value().unwrap_or(0);
                if removed > 0 {
                    debug!(target: "scrape", removed, "removed overlay elements");
                }
            }
            Err(e) => debug!(target: "scrape", error = %e, "overlay cleanup skipped"),
        }
    }

    /// Narrow the site's own country/category filters to what we track.
    /// Strictly best-effort — an ad blocking the control is routine, and the
    /// normalizer discards untracked economies anyway.
    async fn apply_site_filters(&self, page: &Page) {
        let countries =
            serde_json::to_string(COUNTRY_FILTER_IDS).expect("static list serializes");
        let categories =
            serde_json::to_string(CATEGORY_FILTER_LABELS).expect("static list serializes");
        let js = format!(
            "(() => {{ \
               const anchor = document.querySelector('#filterStateAnchor'); \
               if (!anchor) return false; \
               anchor.click(); \
               document.querySelectorAll('#countries_ul li input').forEach(el => el.checked = false); \
               document.querySelectorAll('#categories_ul li input').forEach(el => el.checked = false); \
               for (const id of {countries}) {{ \
                 const check = document.querySelector('#country' + id); \
                 if (check) check.checked = true; \
               }} \
               const labels = document.querySelectorAll('#categories_ul li label'); \
               labels.forEach(label => {{ \
                 if ({categories}.some(cat => label.textContent && label.textContent.includes(cat))) {{ \
                   const checkbox = document.getElementById(label.getAttribute('for') || ''); \
                   if (checkbox) checkbox.checked = true; \
                 }} \
               }}); \
               const submit = document.querySelector('#ecSubmitButton'); \
               if (submit) submit.click(); \
               return true; \
             }})()"
        );
        match page.evaluate(js).await {
            Ok(result) => {
                let applied: bool = result.into_value().unwrap_or(false);
                if !applied {
                    debug!(target: "scrape", "site filter controls not present, backend filter applies");
                }
            }
            Err(e) => debug!(target: "scrape", error = %e, "site filter application skipped"),
        }
    }

    /// Write the window's bounds straight into the site's date-picker inputs
    /// (dd/mm/yyyy) and trigger apply. Direct value writes with synthetic
    /// change events are both faster and less flaky than simulated typing.
    async fn apply_date_range(&self, page: &Page, window: Window) -> Result<(), ScrapeError> {
        let (start, end) = window.local_bounds(Utc::now(), self.source_tz);
        let start = start.format("%d/%m/%Y").to_string();
        let end = end.format("%d/%m/%Y").to_string();
        let js = format!(
            "(() => {{ \
               const toggle = document.querySelector('#datePickerToggleBtn'); \
               if (toggle) toggle.click(); \
               const s = document.querySelector('#startDate'); \
               const e = document.querySelector('#endDate'); \
               if (!s || !e) return false; \
               s.value = '{start}'; \
               e.value = '{end}'; \
               s.dispatchEvent(new Event('change', {{ bubbles: true }})); \
               e.dispatchEvent(new Event('change', {{ bubbles: true }})); \
               const apply = document.querySelector('#applyBtn'); \
               if (apply) apply.click(); \
               return true; \
             }})()"
        );
        let applied: bool = page
            .evaluate(js)
            .await
            .map_err(browser_err)?
            .into_value()
            .unwrap_or(false);
        if !applied {
            return Err(ScrapeError::Structure(
                "date picker inputs not found".into(),
            ));
        }
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        page: &Page,
        css: &str,
        timeout: Duration,
    ) -> Result<(), ScrapeError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if page.find_element(css).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ScrapeError::Timeout {
                    what: css.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// The reload after applying a range is asynchronous with variable
    /// latency; poll for "loading gone, rows present" instead of sleeping.
    async fn wait_until_loaded(&self, page: &Page) -> Result<(), ScrapeError> {
        let timeout = self.tuning.load_timeout;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let ready: bool = match page.evaluate(READY_JS).await {
                Ok(result) => result.into_value().unwrap_or(false),
                Err(_) => false,
            };
            if ready {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ScrapeError::Timeout {
                    what: "calendar table reload".into(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl CalendarSource for ChromiumSource {
    async fn fetch_window(&self, window: Window) -> Result<String, ScrapeError> {
        let config = BrowserConfig::builder()
            .args(vec![
                "--no-sandbox",
                "--disable-setuid-sandbox",
                "--disable-dev-shm-usage",
                "--disable-gpu",
            ])
            .build()
            .map_err(ScrapeError::Browser)?;

        // One isolated browser per window; the source throttles aggressively
        // and a long-lived session accumulates popups and stale state.
        let (mut browser, mut handler) = Browser::launch(config).await.map_err(browser_err)?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = self.drive(&browser, window).await;

        if let Err(e) = browser.close().await {
            warn!(target: "scrape", error = %e, "browser close failed");
        }
        handler_task.abort();

        result
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

fn browser_err(e: chromiumoxide::error::CdpError) -> ScrapeError {
    ScrapeError::Browser(e.to_string())
}
