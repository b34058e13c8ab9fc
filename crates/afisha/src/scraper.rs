use std::future::Future;
use std::time::Duration;

use chrono::Local;
use reqwest::{Client, Url};

use crate::parser::{ParseError, parse_events};
use crate::types::EventRecord;

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Page is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),
    #[error("Invalid source URL '{0}'")]
    InvalidUrl(String),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Anything that can produce the current list of events.
pub trait EventSource {
    fn scrape(&self) -> impl Future<Output = Result<Vec<EventRecord>, ScraperError>> + Send;
}

#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
    page_url: String,
    /// `scheme://host[:port]` of `page_url`, prefixed to relative links.
    origin: String,
}

impl WebScraper {
    pub fn new() -> Result<Self, ScraperError> {
        Self::with_base_url(super::BASE_URL)
    }

    /// Scrapes `base_url` instead of the public site. Relative links are
    /// joined onto the origin of `base_url`, whatever its path.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ScraperError> {
        let base_url = base_url.into();
        let page_url = format!("{}/", base_url.trim().trim_end_matches('/'));
        let parsed =
            Url::parse(&page_url).map_err(|_| ScraperError::InvalidUrl(base_url.clone()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScraperError::InvalidUrl(base_url));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            origin: parsed.origin().ascii_serialization(),
            page_url,
        })
    }

    /// Downloads the events page and turns it into records, in page order.
    pub async fn fetch_events(&self) -> Result<Vec<EventRecord>, ScraperError> {
        log::info!("Fetching events from {}...", self.page_url);
        let html = self.get_html(&self.page_url).await?;
        let events = parse_events(&html, &self.origin, Local::now().date_naive())?;
        log::info!("Scraped {} event(s)", events.len());
        Ok(events)
    }

    /// Invalid UTF-8 is an error rather than replacement characters, so a
    /// garbled page never reaches the store.
    async fn get_html(&self, url: &str) -> Result<String, ScraperError> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?
            .bytes()
            .await
            .inspect_err(|e| log::error!("Read error: {e:?}"))?;

        Ok(String::from_utf8(bytes.to_vec())
            .inspect_err(|e| log::error!("Decode error: {e}"))?)
    }
}

impl EventSource for WebScraper {
    fn scrape(&self) -> impl Future<Output = Result<Vec<EventRecord>, ScraperError>> + Send {
        self.fetch_events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const PAGE: &str = r#"<html><body><div class="events__container">
        <div class="event-card">
            <div class="event-card__date">сегодня</div>
            <a href="/e/1"><h3 class="event-card__title">Meetup A</h3></a>
        </div>
    </div></body></html>"#;

    /// Answers a single request with `status` and `body`, returns its URL.
    async fn serve_once(status: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_fetch_events_from_page() {
        let url = serve_once("200 OK", PAGE.as_bytes().to_vec()).await;
        let scraper = WebScraper::with_base_url(&url).unwrap();

        let events = scraper.fetch_events().await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "Meetup A");
        assert_eq!(events[0].date, Some(Local::now().date_naive()));
        assert_eq!(events[0].site, format!("{url}/e/1"));
    }

    #[tokio::test]
    async fn test_relative_links_use_origin_not_path() {
        let url = serve_once("200 OK", PAGE.as_bytes().to_vec()).await;
        let scraper = WebScraper::with_base_url(format!("{url}/moscow/")).unwrap();

        let events = scraper.fetch_events().await.unwrap();

        assert_eq!(events[0].site, format!("{url}/e/1"));
    }

    #[tokio::test]
    async fn test_error_status_is_http_error() {
        let url = serve_once("503 Service Unavailable", b"busy".to_vec()).await;
        let scraper = WebScraper::with_base_url(&url).unwrap();

        let result = scraper.fetch_events().await;

        assert!(matches!(result, Err(ScraperError::Http(_))));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_decode_error() {
        let mut body = PAGE.replace("Meetup A", "Meetup ").into_bytes();
        let at = body.windows(7).position(|w| w == b"Meetup ").unwrap() + 7;
        body.splice(at..at, [0xff, 0xfe]);
        let url = serve_once("200 OK", body).await;
        let scraper = WebScraper::with_base_url(&url).unwrap();

        let result = scraper.fetch_events().await;

        assert!(matches!(result, Err(ScraperError::Decode(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_http_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let scraper = WebScraper::with_base_url(format!("http://{addr}")).unwrap();

        let result = scraper.fetch_events().await;

        assert!(matches!(result, Err(ScraperError::Http(_))));
    }

    #[test]
    fn test_rejects_non_http_source() {
        assert!(matches!(
            WebScraper::with_base_url("ftp://events.yandex.ru"),
            Err(ScraperError::InvalidUrl(_))
        ));
        assert!(matches!(
            WebScraper::with_base_url("not a url"),
            Err(ScraperError::InvalidUrl(_))
        ));
    }
}
