//! Minimal Telegram Bot API client: long polling for updates and sending
//! HTML messages with the command keyboard attached.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use afisha::types::Locale;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::api::EventFeed;
use crate::commands::replies;
use crate::error::BotError;
use crate::handlers::{Bot, IncomingMessage};

const API_BASE: &str = "https://api.telegram.org";
const POLL_TIMEOUT_SECS: u64 = 25;
const RETRY_AFTER_ERROR: Duration = Duration::from_secs(5);

/// Telegram rejects longer texts.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Outbound side of the chat platform.
pub trait Messenger {
    fn send(&self, chat_id: i64, text: &str) -> impl Future<Output = Result<(), BotError>> + Send;
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct KeyboardButton {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
struct ReplyKeyboardMarkup {
    keyboard: Vec<Vec<KeyboardButton>>,
    resize_keyboard: bool,
}

impl ReplyKeyboardMarkup {
    fn for_locale(locale: Locale) -> Self {
        let r = replies(locale);
        let button = |text: &str| KeyboardButton {
            text: text.to_string(),
        };
        Self {
            keyboard: vec![
                vec![button(r.button_all)],
                vec![button(r.button_subscribe), button(r.button_unsubscribe)],
            ],
            resize_keyboard: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct LinkPreviewOptions {
    is_disabled: bool,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    link_preview_options: LinkPreviewOptions,
    reply_markup: &'a ReplyKeyboardMarkup,
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

impl Message {
    /// Messages without text (stickers, photos, ...) are of no interest.
    pub fn into_incoming(self) -> Option<IncomingMessage> {
        let text = self.text?;
        let user_name = self
            .from
            .map(|u| u.username.unwrap_or(u.first_name))
            .unwrap_or_default();
        Some(IncomingMessage {
            chat_id: self.chat.id,
            user_name,
            text,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    keyboard: ReplyKeyboardMarkup,
}

impl TelegramClient {
    pub fn new(token: &str, locale: Locale) -> Result<Self, BotError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", API_BASE, token),
            keyboard: ReplyKeyboardMarkup::for_locale(locale),
        })
    }

    async fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, BotError> {
        let response: ApiResponse<T> = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                // The URL carries the bot token.
                let e = e.without_url();
                log::error!("Telegram {method} failed: {e}");
                e
            })?
            .json()
            .await
            .map_err(reqwest::Error::without_url)?;

        match response {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(BotError::Telegram(format!(
                "{} failed: {}",
                method,
                description.unwrap_or_else(|| "no description".to_string())
            ))),
        }
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, BotError> {
        self.call(
            "getUpdates",
            &GetUpdates {
                offset,
                timeout: POLL_TIMEOUT_SECS,
                allowed_updates: ["message"],
            },
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), BotError> {
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            let _: serde_json::Value = self
                .call(
                    "sendMessage",
                    &SendMessage {
                        chat_id,
                        text: chunk,
                        parse_mode: "HTML",
                        link_preview_options: LinkPreviewOptions { is_disabled: true },
                        reply_markup: &self.keyboard,
                    },
                )
                .await?;
        }
        Ok(())
    }
}

impl Messenger for TelegramClient {
    fn send(&self, chat_id: i64, text: &str) -> impl Future<Output = Result<(), BotError>> + Send {
        self.send_message(chat_id, text)
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Backs a hard cut off to before an HTML entity the window would split.
fn entity_safe_cut(window: &str) -> usize {
    match window.rfind('&') {
        Some(amp) if amp > 0 && !window[amp..].contains(';') => amp,
        _ => window.len(),
    }
}

/// Splits `text` into pieces of at most `max_chars` characters, preferring
/// to cut after a blank-line event separator, then after any newline.
pub fn split_message(text: &str, max_chars: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        let limit = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..limit];
        let cut = window
            .rfind("\n\n\n")
            .map(|i| i + 3)
            .or_else(|| window.rfind('\n').map(|i| i + 1))
            .filter(|i| *i > 0)
            .unwrap_or_else(|| entity_safe_cut(window));
        chunks.push(&rest[..cut]);
        rest = &rest[cut..];
    }
    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest);
    }
    chunks
}

/// Receives updates until `cancel` fires, handing each message to `bot` on
/// its own task.
pub async fn run_polling<F, M>(
    bot: Arc<Bot<F, M>>,
    telegram: &TelegramClient,
    cancel: CancellationToken,
) where
    F: EventFeed + Send + Sync + 'static,
    M: Messenger + Send + Sync + 'static,
{
    let mut offset = 0;
    log::info!("Listening for Telegram updates");

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = telegram.get_updates(offset) => result,
        };

        let updates = match result {
            Ok(updates) => updates,
            Err(e) => {
                log::warn!("Failed to receive updates: {e}");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RETRY_AFTER_ERROR) => continue,
                }
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message.and_then(Message::into_incoming) else {
                continue;
            };
            let bot = Arc::clone(&bot);
            tokio::spawn(async move {
                let chat_id = message.chat_id;
                if let Err(e) = bot.handle(message).await {
                    log::error!("Failed to handle message from {chat_id}: {e}");
                }
            });
        }
    }

    log::info!("Stopped listening for Telegram updates");
}
