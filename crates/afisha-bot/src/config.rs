use std::env;
use std::time::Duration;

use afisha::render::{DateStyle, RenderOptions};
use afisha::types::Locale;

use crate::error::BotError;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api/v1/events/";
pub const DEFAULT_DATABASE: &str = "afisha.sqlite3";
pub const DEFAULT_RETRY_PERIOD: u64 = 1800;

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_token: String,
    pub api_url: String,
    pub database: String,
    /// Pause between two change checks.
    pub retry_period: Duration,
    pub locale: Locale,
    pub date_style: DateStyle,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, BotError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any variable source, `from_env` passes the
    /// process environment.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, BotError> {
        let telegram_token = var("TELEGRAM_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| BotError::Config("TELEGRAM_TOKEN is not set".to_string()))?;

        let retry_period = match var("RETRY_PERIOD") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| {
                    BotError::Config(format!(
                        "RETRY_PERIOD must be a positive number of seconds, got '{}'",
                        value
                    ))
                })?,
            None => DEFAULT_RETRY_PERIOD,
        };

        let locale = match var("AFISHA_LOCALE") {
            Some(value) => value
                .parse::<Locale>()
                .map_err(|e| BotError::Config(e.to_string()))?,
            None => Locale::default(),
        };

        let date_style = match var("AFISHA_DATE_STYLE") {
            Some(value) => value
                .parse::<DateStyle>()
                .map_err(|e| BotError::Config(e.to_string()))?,
            None => DateStyle::default(),
        };

        Ok(Self {
            telegram_token,
            api_url: var("AFISHA_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            database: var("AFISHA_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            retry_period: Duration::from_secs(retry_period),
            locale,
            date_style,
        })
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions::new(self.locale, self.date_style)
    }
}
