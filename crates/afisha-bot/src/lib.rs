pub mod api;
pub mod commands;
pub mod config;
pub mod detector;
pub mod error;
pub mod handlers;
pub mod telegram;

#[cfg(test)]
mod testing;

pub use api::{ApiClient, EventFeed};
pub use config::BotConfig;
pub use detector::{ChangeDetector, run_notifier};
pub use error::BotError;
pub use handlers::{Bot, IncomingMessage};
pub use telegram::{Messenger, TelegramClient, run_polling};
