use std::future::Future;
use std::time::Duration;

use afisha::types::EventRecord;
use reqwest::Client;

use crate::error::BotError;

/// Where the bot reads the current event list from.
pub trait EventFeed {
    fn fetch_events(&self) -> impl Future<Output = Result<Vec<EventRecord>, BotError>> + Send;
}

/// Client of the events REST API. Every call makes the server re-scrape.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    events_url: String,
}

impl ApiClient {
    pub fn new(events_url: impl Into<String>) -> Result<Self, BotError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            events_url: events_url.into(),
        })
    }

    pub async fn list_events(&self) -> Result<Vec<EventRecord>, BotError> {
        log::debug!("Fetching events from {}", self.events_url);
        Ok(self
            .client
            .get(&self.events_url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?
            .json::<Vec<EventRecord>>()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?)
    }
}

impl EventFeed for ApiClient {
    fn fetch_events(&self) -> impl Future<Output = Result<Vec<EventRecord>, BotError>> + Send {
        self.list_events()
    }
}
