use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::models::{ScheduleSnapshot, ScreeningRecord, TicketStatus};

/// Container selectors tried in priority order; the first one that yields
/// usable screening rows wins. Festival sites vary, so we go from the most
/// specific markup conventions down to generic list items.
const ROW_SELECTORS: &[&str] = &[
    ".screening",
    ".session",
    ".showtime",
    ".film-screening",
    ".schedule-item",
    ".event-card",
    "[data-screening]",
    "tr",
    "li",
];

const TITLE_SELECTORS: &[&str] = &[
    ".title",
    ".film-title",
    ".event-title",
    "h1",
    "h2",
    "h3",
    "h4",
    "strong",
];

const TIME_SELECTORS: &[&str] = &["time", ".time", ".screening-time", ".session-time", ".date"];

const ACTION_SELECTORS: &[&str] = &["button", "a.btn", "a.button", "input[type='submit']", "a"];

pub struct ScheduleExtractor {
    time_pattern: Regex,
}

impl Default for ScheduleExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleExtractor {
    pub fn new() -> Self {
        Self {
            // "Oct 12 7:00 PM", "Sat, Oct 12 19:00", bare "7:00 PM"
            time_pattern: Regex::new(
                r"(?i)(?:(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s+)?(?:(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2},?\s+)?\d{1,2}:\d{2}\s*(?:am|pm)?",
            )
            .expect("time pattern is valid"),
        }
    }

    /// Parse a rendered schedule page into a snapshot. Rows without a
    /// recognizable title are skipped; a page where nothing matches produces
    /// an empty snapshot rather than an error.
    pub fn extract(&self, html: &str, base_url: &str) -> ScheduleSnapshot {
        let document = Html::parse_document(html);

        for selector_str in ROW_SELECTORS {
            let Ok(selector) = Selector::parse(selector_str) else {
                continue;
            };

            let records: Vec<ScreeningRecord> = document
                .select(&selector)
                .filter_map(|row| self.extract_row(row, base_url))
                .collect();

            if !records.is_empty() {
                tracing::debug!(
                    selector = selector_str,
                    count = records.len(),
                    "extracted schedule rows"
                );
                return records.into_iter().collect();
            }
        }

        tracing::warn!("no screening rows recognized on schedule page");
        ScheduleSnapshot::new()
    }

    fn extract_row(&self, row: ElementRef<'_>, base_url: &str) -> Option<ScreeningRecord> {
        let title = first_text(row, TITLE_SELECTORS)?;

        let (button_text, href) = self.find_action(row);
        let screening_time = first_text(row, TIME_SELECTORS)
            .or_else(|| self.time_from_text(&element_text(row)))
            .unwrap_or_default();

        let url = href
            .and_then(|h| resolve_url(base_url, &h))
            .unwrap_or_else(|| base_url.to_string());

        let status = classify_status(&button_text, &element_text(row));

        Some(ScreeningRecord::new(title, screening_time, status, button_text, url))
    }

    fn find_action(&self, row: ElementRef<'_>) -> (String, Option<String>) {
        for selector_str in ACTION_SELECTORS {
            let Ok(selector) = Selector::parse(selector_str) else {
                continue;
            };
            if let Some(el) = row.select(&selector).next() {
                let text = element_text(el);
                if text.is_empty() {
                    continue;
                }
                let href = el.value().attr("href").map(String::from);
                return (text, href);
            }
        }
        (String::new(), None)
    }

    fn time_from_text(&self, text: &str) -> Option<String> {
        self.time_pattern
            .find(text)
            .map(|m| m.as_str().trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// Classify availability from the action label, falling back to the row text
/// for states some sites render outside the button.
pub fn classify_status(button_text: &str, row_text: &str) -> TicketStatus {
    let button = button_text.to_lowercase();
    let row = row_text.to_lowercase();

    let sold_out = |t: &str| t.contains("sold out") || t.contains("soldout");
    let waitlisted = |t: &str| {
        t.contains("waitlist") || t.contains("wait list") || t.contains("standby")
    };
    let purchasable = |t: &str| {
        t.contains("order")
            || t.contains("buy")
            || t.contains("purchase")
            || (t.contains("get") && t.contains("ticket"))
    };

    if sold_out(&button) || (button.is_empty() && sold_out(&row)) {
        TicketStatus::SoldOut
    } else if waitlisted(&button) || (button.is_empty() && waitlisted(&row)) {
        TicketStatus::Waitlist
    } else if purchasable(&button) {
        TicketStatus::Available
    } else {
        TicketStatus::Unknown
    }
}

fn first_text(row: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(el) = row.select(&selector).next() {
            let text = element_text(el);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

fn resolve_url(base: &str, href: &str) -> Option<String> {
    Url::parse(base)
        .ok()?
        .join(href)
        .ok()
        .map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SCHEDULE_HTML: &str = r#"
        <html><body>
          <div class="schedule">
            <div class="screening">
              <h3 class="title">Mirror</h3>
              <span class="time">Oct 12 9:30 PM</span>
              <a class="btn" href="/order/mirror-evening">Order Tickets</a>
            </div>
            <div class="screening">
              <h3 class="title">Stalker</h3>
              <span class="time">Oct 13 7:00 PM</span>
              <button disabled>Sold Out</button>
            </div>
            <div class="screening">
              <h3 class="title">Solaris</h3>
              <span class="time">Oct 14 5:00 PM</span>
              <a href="/waitlist/solaris">Join Waitlist</a>
            </div>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_extracts_rows_with_status_and_resolved_urls() {
        let extractor = ScheduleExtractor::new();
        let snapshot = extractor.extract(SCHEDULE_HTML, "https://fest.example/schedule");

        assert_eq!(snapshot.len(), 3);

        let mirror = snapshot.get("mirror_oct 12 9:30 pm").unwrap();
        assert_eq!(mirror.status, TicketStatus::Available);
        assert_eq!(mirror.button_text, "Order Tickets");
        assert_eq!(mirror.url, "https://fest.example/order/mirror-evening");

        let stalker = snapshot.get("stalker_oct 13 7:00 pm").unwrap();
        assert_eq!(stalker.status, TicketStatus::SoldOut);

        let solaris = snapshot.get("solaris_oct 14 5:00 pm").unwrap();
        assert_eq!(solaris.status, TicketStatus::Waitlist);
    }

    #[test]
    fn test_falls_back_to_generic_rows() {
        let html = r#"
            <table>
              <tr><td><strong>Mirror</strong> 9:30 PM</td><td><a href="/t/1">Buy tickets</a></td></tr>
            </table>
        "#;
        let extractor = ScheduleExtractor::new();
        let snapshot = extractor.extract(html, "https://fest.example/schedule");

        assert_eq!(snapshot.len(), 1);
        let (_, record) = snapshot.iter().next().unwrap();
        assert_eq!(record.title, "Mirror");
        assert_eq!(record.status, TicketStatus::Available);
        assert_eq!(record.screening_time, "9:30 PM");
    }

    #[test]
    fn test_unrecognized_page_yields_empty_snapshot() {
        let extractor = ScheduleExtractor::new();
        let snapshot = extractor.extract("<html><body><p>Maintenance</p></body></html>", "https://fest.example");
        assert!(snapshot.is_empty());
    }

    #[rstest]
    #[case("Order Tickets", "", TicketStatus::Available)]
    #[case("Buy Now", "", TicketStatus::Available)]
    #[case("Get Tickets", "", TicketStatus::Available)]
    #[case("Sold Out", "", TicketStatus::SoldOut)]
    #[case("SOLDOUT", "", TicketStatus::SoldOut)]
    #[case("Join Waitlist", "", TicketStatus::Waitlist)]
    #[case("Standby", "", TicketStatus::Waitlist)]
    #[case("Details", "", TicketStatus::Unknown)]
    #[case("", "This screening is sold out", TicketStatus::SoldOut)]
    fn test_status_classification(
        #[case] button: &str,
        #[case] row: &str,
        #[case] expected: TicketStatus,
    ) {
        assert_eq!(classify_status(button, row), expected);
    }

    #[test]
    fn test_time_regex_finds_time_in_row_text() {
        let extractor = ScheduleExtractor::new();
        assert_eq!(
            extractor.time_from_text("Mirror — Sat, Oct 12 9:30 PM, Main Hall"),
            Some("Sat, Oct 12 9:30 PM".to_string())
        );
        assert_eq!(extractor.time_from_text("no time here"), None);
    }
}
