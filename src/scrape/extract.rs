// src/scrape/extract.rs
//! Row extraction from a calendar-table HTML snapshot.
//!
//! This file and `browser.rs` are the only places that know the source
//! site's DOM contract. Everything here works on a plain HTML string via CSS
//! selectors, so the pipeline downstream of the browser can be exercised
//! against fixtures.
//!
//! The table interleaves two kinds of rows: date separators (a label like
//! "Jueves, 24 de diciembre de 2025", no event payload) and event rows keyed
//! by an id of the form `eventRowId_<n>`. Actual/forecast/previous values do
//! NOT live inside the event row; they sit in separate elements elsewhere in
//! the document tied to the row by id suffix (`eventActual_<n>` etc.), so
//! they are looked up by id, never by position.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use super::ScrapeError;

const EVENT_ROW_PREFIX: &str = "eventRowId_";

static TABLE_ROOT: Lazy<Selector> = Lazy::new(|| sel("#economicCalendarData"));
static ROWS: Lazy<Selector> = Lazy::new(|| sel("tr"));
static DAY_LABEL: Lazy<Selector> = Lazy::new(|| sel(".theDay"));
static TIME_CELL: Lazy<Selector> = Lazy::new(|| sel(".time"));
static CURRENCY_CELL: Lazy<Selector> = Lazy::new(|| sel(".flagCur"));
static COUNTRY_FLAG: Lazy<Selector> = Lazy::new(|| sel(".flagCur .ceFlags"));
static EVENT_LINK: Lazy<Selector> = Lazy::new(|| sel(".event a"));
static EVENT_CELL: Lazy<Selector> = Lazy::new(|| sel(".event"));
static BULL_ICONS: Lazy<Selector> = Lazy::new(|| sel("td.sentiment .grayFullBullishIcon"));

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid css")
}

/// One event row as it appears in the markup, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub row_id: String,
    /// Separator label attributed to this row, when one was found.
    pub date_label: Option<String>,
    pub time: String,
    pub currency: String,
    pub country_label: String,
    pub name: String,
    /// Filled sentiment icons in the impact cell.
    pub bull_icons: usize,
    pub actual: Option<String>,
    pub forecast: Option<String>,
    pub previous: Option<String>,
}

/// Extract every event row from a page snapshot, attributing dates from the
/// separator rows.
///
/// The running "current date" updates at each separator and applies to all
/// following event rows. If an event row shows up before any separator (the
/// site renders lazily and can emit rows out of order), we walk backwards
/// through the preceding rows for the nearest separator instead of guessing.
pub fn extract_raw_rows(html: &str) -> Result<Vec<RawRow>, ScrapeError> {
    let doc = Html::parse_document(html);
    let root = doc
        .select(&TABLE_ROOT)
        .next()
        .ok_or_else(|| ScrapeError::Structure("calendar table root not found".into()))?;

    let rows: Vec<ElementRef> = root.select(&ROWS).collect();
    let mut current_date: Option<String> = None;
    let mut out = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        if let Some(label) = separator_label(row) {
            current_date = Some(label);
            continue;
        }
        let Some(row_id) = event_row_id(row) else {
            continue;
        };

        let date_label = current_date
            .clone()
            .or_else(|| recover_date_backwards(&rows, idx));

        let time = cell_text(row, &TIME_CELL).unwrap_or_default();
        let currency = cell_text(row, &CURRENCY_CELL)
            .unwrap_or_default()
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
        let country_label = row
            .select(&COUNTRY_FLAG)
            .next()
            .and_then(|el| el.value().attr("title"))
            .unwrap_or_default()
            .to_string();
        let name = cell_text(row, &EVENT_LINK)
            .or_else(|| cell_text(row, &EVENT_CELL))
            .unwrap_or_default();
        let bull_icons = row.select(&BULL_ICONS).count();

        // Rows with no time or no name are spacers/ads, not events.
        if time.is_empty() || name.is_empty() {
            continue;
        }

        out.push(RawRow {
            actual: value_by_id(&doc, "eventActual_", &row_id),
            forecast: value_by_id(&doc, "eventForecast_", &row_id),
            previous: value_by_id(&doc, "eventPrevious_", &row_id),
            row_id,
            date_label,
            time,
            currency,
            country_label,
            name,
            bull_icons,
        });
    }

    Ok(out)
}

/// Detect a date-separator row and return its label.
///
/// Separators usually carry a `.theDay` cell; a fallback matches rows with
/// no id whose text reads like a Spanish long-form date ("... de ... de ...").
fn separator_label(row: &ElementRef) -> Option<String> {
    if let Some(day) = row.select(&DAY_LABEL).next() {
        let label = collect_text(&day);
        if !label.is_empty() {
            return Some(label);
        }
    }
    if row.value().classes().any(|c| c == "theDay") || row.value().id().is_none() {
        let text = collect_text(row);
        if text.contains(" de ") && !text.is_empty() {
            return Some(text);
        }
    }
    None
}

fn event_row_id(row: &ElementRef) -> Option<String> {
    row.value()
        .id()
        .and_then(|id| id.strip_prefix(EVENT_ROW_PREFIX))
        .filter(|suffix| !suffix.is_empty())
        .map(str::to_string)
}

/// Nearest separator before `idx`, for event rows rendered ahead of their
/// date header.
fn recover_date_backwards(rows: &[ElementRef], idx: usize) -> Option<String> {
    rows[..idx].iter().rev().find_map(separator_label)
}

fn cell_text(row: &ElementRef, selector: &Selector) -> Option<String> {
    row.select(selector).next().map(|el| collect_text(&el)).filter(|t| !t.is_empty())
}

fn collect_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Look up `#<prefix><row id>` anywhere in the document and return its text,
/// treating placeholder blanks (nbsp) as absent.
fn value_by_id(doc: &Html, prefix: &str, row_id: &str) -> Option<String> {
    let selector = Selector::parse(&format!("#{prefix}{row_id}")).ok()?;
    let text = doc.select(&selector).next().map(|el| collect_text(&el))?;
    let cleaned = text.replace('\u{a0}', " ").trim().to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r##"
<html><body>
<table id="economicCalendarData"><tbody>
  <tr><td class="theDay">Lunes, 1 de enero de 2025</td></tr>
  <tr id="eventRowId_11">
    <td class="time">08:30</td>
    <td class="flagCur"><span class="ceFlags" title="Estados Unidos"></span> USD</td>
    <td class="event"><a>Nonfarm Payrolls</a></td>
    <td class="sentiment"><i class="grayFullBullishIcon"></i><i class="grayFullBullishIcon"></i><i class="grayFullBullishIcon"></i></td>
  </tr>
  <tr id="eventRowId_12">
    <td class="time">10:00</td>
    <td class="flagCur"><span class="ceFlags" title="Alemania"></span> EUR</td>
    <td class="event"><a>Ifo Business Climate</a></td>
    <td class="sentiment"><i class="grayFullBullishIcon"></i><i class="grayFullBullishIcon"></i></td>
  </tr>
</tbody></table>
<span id="eventActual_11">225K</span>
<span id="eventForecast_11">200K</span>
<span id="eventPrevious_11">190K</span>
<span id="eventActual_12">&nbsp;</span>
</body></html>
"##;

    #[test]
    fn separator_dates_are_attributed_to_following_rows() {
        let rows = extract_raw_rows(FIXTURE).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].date_label.as_deref(),
            Some("Lunes, 1 de enero de 2025")
        );
        assert_eq!(
            rows[1].date_label.as_deref(),
            Some("Lunes, 1 de enero de 2025")
        );
    }

    #[test]
    fn values_are_joined_by_id_suffix_not_position() {
        let rows = extract_raw_rows(FIXTURE).unwrap();
        assert_eq!(rows[0].actual.as_deref(), Some("225K"));
        assert_eq!(rows[0].forecast.as_deref(), Some("200K"));
        assert_eq!(rows[0].previous.as_deref(), Some("190K"));
        // nbsp placeholder reads as absent
        assert_eq!(rows[1].actual, None);
        assert_eq!(rows[1].forecast, None);
    }

    #[test]
    fn impact_icons_are_counted_per_row() {
        let rows = extract_raw_rows(FIXTURE).unwrap();
        assert_eq!(rows[0].bull_icons, 3);
        assert_eq!(rows[1].bull_icons, 2);
    }

    #[test]
    fn event_row_before_any_separator_recovers_from_siblings() {
        // Same document but with the first event row hoisted above its
        // separator, as lazy rendering can produce.
        let html = r##"
<table id="economicCalendarData"><tbody>
  <tr id="eventRowId_7">
    <td class="time">09:00</td>
    <td class="flagCur"><span class="ceFlags" title="España"></span> EUR</td>
    <td class="event"><a>Ventas Minoristas</a></td>
    <td class="sentiment"><i class="grayFullBullishIcon"></i></td>
  </tr>
</tbody></table>"##;
        let rows = extract_raw_rows(html).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date_label, None); // nothing to recover from

        let html_with_prior = r##"
<table id="economicCalendarData"><tbody>
  <tr><td class="theDay">Martes, 2 de enero de 2025</td></tr>
  <tr id="eventRowId_8">
    <td class="time">09:00</td>
    <td class="flagCur"><span class="ceFlags" title="España"></span> EUR</td>
    <td class="event"><a>Ventas Minoristas</a></td>
    <td class="sentiment"></td>
  </tr>
</tbody></table>"##;
        let rows = extract_raw_rows(html_with_prior).unwrap();
        assert_eq!(
            rows[0].date_label.as_deref(),
            Some("Martes, 2 de enero de 2025")
        );
    }

    #[test]
    fn missing_table_root_is_a_structure_error() {
        let err = extract_raw_rows("<html><body><p>blocked</p></body></html>").unwrap_err();
        assert!(matches!(err, ScrapeError::Structure(_)));
    }
}
