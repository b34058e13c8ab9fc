mod parser;
pub mod date;
pub mod reconcile;
pub mod render;
pub mod scraper;
pub mod store;
pub mod types;

pub use parser::{EventPage, ParseError, parse_events};
pub use reconcile::{EventRepository, ReconcileReport, reconcile};
pub use scraper::{EventSource, ScraperError, WebScraper};
pub use store::{Database, StoreError};

/// Origin used to absolutize relative event links.
pub const BASE_URL: &str = "https://events.yandex.ru";
