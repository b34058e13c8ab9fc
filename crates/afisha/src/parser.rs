use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

use crate::date::{is_pending, normalize_date};
use crate::types::{EventRecord, RawEventBlock};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Missing element: {0}")]
    MissingElement(String),
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Failed to parse date: {0}")]
    DateParse(String),
}

const CONTAINER: &str = ".events__container";
const DATE_CELL: &str = ".event-card__date";
const TITLE_CELL: &str = ".event-card__title";
const LINK: &str = "a[href]";

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_empty_block(block: ElementRef) -> bool {
    block.children().filter_map(ElementRef::wrap).next().is_none()
        && block.text().all(|t| t.trim().is_empty())
}

/// Joins a link found on the page with `origin` unless it is already absolute.
pub fn absolutize(href: &str, origin: &str) -> String {
    if href.starts_with("https://") || href.starts_with("http://") {
        return href.to_string();
    }
    let origin = origin.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{}{}", origin, href)
    } else {
        format!("{}/{}", origin, href)
    }
}

/// A parsed events page. Blocks are extracted on demand, so
/// [`EventPage::blocks`] can be walked as many times as needed.
#[derive(Debug)]
pub struct EventPage {
    document: Html,
    origin: String,
}

impl EventPage {
    pub fn parse(html: &str, origin: &str) -> Result<Self, ParseError> {
        let document = Html::parse_document(html);
        let container_sel = Selector::parse(CONTAINER).unwrap();
        if document.select(&container_sel).next().is_none() {
            return Err(ParseError::MissingElement(CONTAINER.to_string()));
        }

        Ok(Self {
            document,
            origin: origin.to_string(),
        })
    }

    /// Event cards in document order, empty cards skipped.
    pub fn blocks(&self) -> impl Iterator<Item = Result<RawEventBlock, ParseError>> + '_ {
        let container_sel = Selector::parse(CONTAINER).unwrap();
        let date_sel = Selector::parse(DATE_CELL).unwrap();
        let title_sel = Selector::parse(TITLE_CELL).unwrap();
        let link_sel = Selector::parse(LINK).unwrap();

        self.document
            .select(&container_sel)
            .next()
            .into_iter()
            .flat_map(|container| container.children().filter_map(ElementRef::wrap))
            .filter(|block| !is_empty_block(*block))
            .map(move |block| self.extract_block(block, &date_sel, &title_sel, &link_sel))
    }

    fn extract_block(
        &self,
        block: ElementRef,
        date_sel: &Selector,
        title_sel: &Selector,
        link_sel: &Selector,
    ) -> Result<RawEventBlock, ParseError> {
        let name = block
            .select(title_sel)
            .next()
            .map(|e| normalize_whitespace(&elem_text(e)))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ParseError::MissingField(format!("{} in event card", TITLE_CELL)))?;

        let href = block
            .select(link_sel)
            .next()
            .and_then(|e| e.value().attr("href"))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ParseError::MissingField(format!("link of '{}'", name)))?;

        let date_text = match block.select(date_sel).next() {
            Some(cell) => {
                let text = normalize_whitespace(&elem_text(cell));
                if is_pending(&text) {
                    log::debug!("Date of '{}' is not announced yet", name);
                    None
                } else {
                    Some(text)
                }
            }
            None => {
                log::warn!("No date cell for '{}'", name);
                None
            }
        };

        Ok(RawEventBlock {
            date_text,
            link: absolutize(href, &self.origin),
            name,
        })
    }
}

/// Extracts and normalizes every event on the page.
///
/// A structural problem (missing container, title or link) fails the whole
/// page. A date that cannot be understood only clears that record's date.
pub fn parse_events(
    html: &str,
    origin: &str,
    today: NaiveDate,
) -> Result<Vec<EventRecord>, ParseError> {
    let page = EventPage::parse(html, origin)?;

    page.blocks()
        .map(|block| {
            let block = block?;
            let date = block
                .date_text
                .as_deref()
                .and_then(|text| match normalize_date(text, today) {
                    Ok(date) => Some(date),
                    Err(e) => {
                        log::warn!("Keeping '{}' without a date: {}", block.name, e);
                        None
                    }
                });

            Ok(EventRecord {
                date,
                name: block.name,
                site: block.link,
            })
        })
        .collect()
}
