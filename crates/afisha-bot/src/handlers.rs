use std::sync::{Arc, Mutex, MutexGuard};

use afisha::Database;
use afisha::render::{RenderOptions, render_events};

use crate::api::EventFeed;
use crate::commands::{Command, Replies, replies};
use crate::error::BotError;
use crate::telegram::{Messenger, escape_html};

/// A text message from a chat, stripped down to what the handlers need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub user_name: String,
    pub text: String,
}

pub struct Bot<F, M> {
    feed: F,
    messenger: Arc<M>,
    db: Arc<Mutex<Database>>,
    options: RenderOptions,
}

pub(crate) fn lock(db: &Mutex<Database>) -> Result<MutexGuard<'_, Database>, BotError> {
    db.lock()
        .map_err(|_| BotError::Internal("database lock poisoned".to_string()))
}

impl<F: EventFeed, M: Messenger> Bot<F, M> {
    pub fn new(feed: F, messenger: Arc<M>, db: Arc<Mutex<Database>>, options: RenderOptions) -> Self {
        Self {
            feed,
            messenger,
            db,
            options,
        }
    }

    fn replies(&self) -> &'static Replies {
        replies(self.options.locale)
    }

    pub async fn handle(&self, message: IncomingMessage) -> Result<(), BotError> {
        let command = Command::parse(&message.text);
        log::debug!("Chat {} sent {:?}", message.chat_id, command);

        let reply = match command {
            Command::Start => {
                self.touch(&message)?;
                self.replies().greeting.to_string()
            }
            Command::AllEvents => {
                self.touch(&message)?;
                self.events_text().await
            }
            Command::Subscribe => {
                if self.set_subscribed(&message, true)? {
                    log::info!("Chat {} subscribed", message.chat_id);
                    self.replies().subscribed.to_string()
                } else {
                    self.replies().already_subscribed.to_string()
                }
            }
            Command::Unsubscribe => {
                if self.set_subscribed(&message, false)? {
                    log::info!("Chat {} unsubscribed", message.chat_id);
                    self.replies().unsubscribed.to_string()
                } else {
                    self.replies().not_subscribed.to_string()
                }
            }
            Command::Unknown => {
                self.touch(&message)?;
                self.replies().unknown.to_string()
            }
        };

        self.messenger.send(message.chat_id, &reply).await
    }

    fn touch(&self, message: &IncomingMessage) -> Result<(), BotError> {
        lock(&self.db)?.touch_subscriber(message.chat_id, &message.user_name)?;
        Ok(())
    }

    fn set_subscribed(&self, message: &IncomingMessage, subscribed: bool) -> Result<bool, BotError> {
        Ok(lock(&self.db)?.set_subscribed(message.chat_id, &message.user_name, subscribed)?)
    }

    async fn events_text(&self) -> String {
        match self.feed.fetch_events().await {
            Ok(events) if events.is_empty() => self.replies().no_events.to_string(),
            Ok(events) => escape_html(&render_events(&events, self.options)),
            Err(e) => {
                log::error!("Failed to fetch events: {e}");
                self.replies().unavailable.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::EN;
    use crate::testing::{FakeFeed, FakeMessenger};
    use afisha::render::DateStyle;
    use afisha::types::{EventRecord, Locale};
    use chrono::NaiveDate;

    fn new_bot(feed: FakeFeed) -> (Bot<FakeFeed, FakeMessenger>, Arc<FakeMessenger>) {
        let messenger = Arc::new(FakeMessenger::default());
        let db = Arc::new(Mutex::new(Database::in_memory().unwrap()));
        let bot = Bot::new(
            feed,
            Arc::clone(&messenger),
            db,
            RenderOptions::new(Locale::En, DateStyle::Iso),
        );
        (bot, messenger)
    }

    fn message(chat_id: i64, text: &str) -> IncomingMessage {
        IncomingMessage {
            chat_id,
            user_name: "anna".to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_start_greets_and_registers() {
        let (bot, messenger) = new_bot(FakeFeed::fixed(Some(vec![])));

        bot.handle(message(5, "/start")).await.unwrap();

        assert_eq!(messenger.last(), Some((5, EN.greeting.to_string())));
        let subscription = lock(&bot.db).unwrap().subscription(5).unwrap().unwrap();
        assert!(!subscription.subscribed);
        assert_eq!(subscription.profile.name, "anna");
    }

    #[tokio::test]
    async fn test_all_events_renders_list() {
        let events = vec![EventRecord::new(
            NaiveDate::from_ymd_opt(2026, 10, 17),
            "R&D <Meetup>",
            "https://events.yandex.ru/e/1",
        )];
        let (bot, messenger) = new_bot(FakeFeed::fixed(Some(events)));

        bot.handle(message(5, "all events")).await.unwrap();

        assert_eq!(
            messenger.last().unwrap().1,
            "Date: 2026-10-17\nName: R&amp;D &lt;Meetup&gt;\nSite: https://events.yandex.ru/e/1\n\n\n"
        );
    }

    #[tokio::test]
    async fn test_all_events_when_empty_or_unavailable() {
        let (empty, messenger) = new_bot(FakeFeed::fixed(Some(vec![])));
        empty.handle(message(5, "all events")).await.unwrap();
        assert_eq!(messenger.last().unwrap().1, EN.no_events);

        let (offline, messenger) = new_bot(FakeFeed::fixed(None));
        offline.handle(message(5, "all events")).await.unwrap();
        assert_eq!(messenger.last().unwrap().1, EN.unavailable);
    }

    #[tokio::test]
    async fn test_subscribe_twice_then_unsubscribe() {
        let (bot, messenger) = new_bot(FakeFeed::fixed(Some(vec![])));

        bot.handle(message(5, "subscribe")).await.unwrap();
        assert_eq!(messenger.last().unwrap().1, EN.subscribed);

        bot.handle(message(5, "Subscribe")).await.unwrap();
        assert_eq!(messenger.last().unwrap().1, EN.already_subscribed);

        bot.handle(message(5, "unsubscribe")).await.unwrap();
        assert_eq!(messenger.last().unwrap().1, EN.unsubscribed);

        bot.handle(message(5, "unsubscribe")).await.unwrap();
        assert_eq!(messenger.last().unwrap().1, EN.not_subscribed);
    }

    #[tokio::test]
    async fn test_unknown_text_gets_fallback_and_registers() {
        let (bot, messenger) = new_bot(FakeFeed::fixed(Some(vec![])));

        bot.handle(message(9, "what's on?")).await.unwrap();

        assert_eq!(messenger.last(), Some((9, EN.unknown.to_string())));
        assert!(lock(&bot.db).unwrap().subscription(9).unwrap().is_some());
    }
}
