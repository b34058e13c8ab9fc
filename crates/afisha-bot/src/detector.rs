//! Watches the rendered event list and tells subscribers when it changes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use afisha::Database;
use afisha::render::{RenderOptions, render_events};
use afisha::types::SubscriberProfile;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio_util::sync::CancellationToken;

use crate::api::EventFeed;
use crate::commands::replies;
use crate::error::BotError;
use crate::handlers::lock;
use crate::telegram::{Messenger, escape_html};

pub struct ChangeDetector<F> {
    feed: F,
    options: RenderOptions,
    interval: Duration,
    last: Option<String>,
}

impl<F: EventFeed> ChangeDetector<F> {
    pub fn new(feed: F, options: RenderOptions, interval: Duration) -> Self {
        Self {
            feed,
            options,
            interval,
            last: None,
        }
    }

    pub fn options(&self) -> RenderOptions {
        self.options
    }

    /// Text seen by the latest successful poll.
    pub fn baseline(&self) -> Option<&str> {
        self.last.as_deref()
    }

    async fn poll(&self) -> Result<String, BotError> {
        let events = self.feed.fetch_events().await?;
        Ok(render_events(&events, self.options))
    }

    /// Polls until the rendered list differs from the previous successful
    /// poll and returns the new text. The very first successful poll only
    /// sets the baseline.
    ///
    /// Returns `None` once `cancel` fires or after `max_polls` polls.
    pub async fn wait_for_change(
        &mut self,
        cancel: &CancellationToken,
        max_polls: Option<usize>,
    ) -> Option<String> {
        let mut polls = 0;

        loop {
            if max_polls.is_some_and(|max| polls >= max) {
                return None;
            }

            if polls > 0 || self.last.is_some() {
                tokio::select! {
                    _ = cancel.cancelled() => return None,
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => return None,
                result = self.poll() => result,
            };
            polls += 1;

            let text = match result {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("Change check failed, keeping the previous list: {e}");
                    continue;
                }
            };

            match self.last.replace(text.clone()) {
                Some(previous) if previous != text => {
                    log::info!("Event list changed");
                    return Some(text);
                }
                Some(_) => log::debug!("Event list unchanged"),
                None => log::debug!("Event list baseline taken"),
            }
        }
    }
}

fn subscribers(db: &Mutex<Database>) -> Result<Vec<SubscriberProfile>, BotError> {
    Ok(lock(db)?.active_subscribers()?)
}

/// Sends `text` to every active subscriber and returns how many got it.
pub async fn notify_subscribers<M: Messenger>(
    messenger: &M,
    db: &Mutex<Database>,
    text: &str,
) -> Result<usize, BotError> {
    let subscribers = subscribers(db)?;
    log::info!("Notifying {} subscriber(s)", subscribers.len());

    let mut sends: FuturesUnordered<_> = subscribers
        .iter()
        .map(|profile| async move { (profile, messenger.send(profile.external_id, text).await) })
        .collect();

    let mut delivered = 0;
    while let Some((profile, result)) = sends.next().await {
        match result {
            Ok(()) => delivered += 1,
            Err(e) => log::error!(
                "Failed to notify {} ({}): {e}",
                profile.name,
                profile.external_id
            ),
        }
    }
    Ok(delivered)
}

/// Runs until `cancel` fires, notifying subscribers on every change.
pub async fn run_notifier<F, M>(
    mut detector: ChangeDetector<F>,
    messenger: Arc<M>,
    db: Arc<Mutex<Database>>,
    cancel: CancellationToken,
) where
    F: EventFeed,
    M: Messenger,
{
    log::info!("Watching the event list for changes");

    while let Some(text) = detector.wait_for_change(&cancel, None).await {
        let text = if text.is_empty() {
            replies(detector.options().locale).no_events.to_string()
        } else {
            escape_html(&text)
        };
        if let Err(e) = notify_subscribers(messenger.as_ref(), &db, &text).await {
            log::error!("Failed to notify subscribers: {e}");
        }
    }

    log::info!("Stopped watching the event list");
}
