use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One event card as it appears on the page, before date normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEventBlock {
    /// `None` when the card has no date cell or the date is still to be announced.
    pub date_text: Option<String>,
    pub name: String,
    /// Always absolute.
    pub link: String,
}

/// A normalized event. `date` is `None` when the site has not announced it
/// yet or when its text could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EventRecord {
    /// `YYYY-MM-DD`, or `null` while the date is not announced.
    pub date: Option<NaiveDate>,
    pub name: String,
    /// Absolute URL of the event page.
    pub site: String,
}

impl EventRecord {
    pub fn new(date: Option<NaiveDate>, name: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            date,
            name: name.into(),
            site: site.into(),
        }
    }
}

impl Display for EventRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.date {
            Some(date) => write!(f, "{} | {} ({})", date, self.name, self.site),
            None => write!(f, "????-??-?? | {} ({})", self.name, self.site),
        }
    }
}

/// An event row together with the id the store assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StoredEvent {
    pub id: i64,
    #[serde(flatten)]
    pub record: EventRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberProfile {
    pub external_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub profile: SubscriberProfile,
    pub subscribed: bool,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid locale '{0}'. Accepted values: 'en', 'ru'")]
pub struct LocaleParseError(String);

/// Language used for user-facing text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    En,
    Ru,
}

impl FromStr for Locale {
    type Err = LocaleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" | "english" => Ok(Locale::En),
            "ru" | "russian" => Ok(Locale::Ru),
            _ => Err(LocaleParseError(s.to_string())),
        }
    }
}

impl Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locale::En => write!(f, "en"),
            Locale::Ru => write!(f, "ru"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_record_json_shape() {
        let record = EventRecord::new(
            NaiveDate::from_ymd_opt(2026, 10, 17),
            "Meetup A",
            "https://events.yandex.ru/e/1",
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "date": "2026-10-17",
                "name": "Meetup A",
                "site": "https://events.yandex.ru/e/1",
            })
        );
    }

    #[test]
    fn test_unknown_date_serializes_as_null() {
        let record = EventRecord::new(None, "Meetup B", "https://events.yandex.ru/e/2");
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["date"].is_null());
    }

    #[test]
    fn test_stored_event_is_flattened() {
        let stored = StoredEvent {
            id: 7,
            record: EventRecord::new(None, "Meetup C", "https://ya.ru/"),
        };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["name"], "Meetup C");

        let back: EventRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, stored.record);
    }

    #[test]
    fn test_locale_from_str() {
        assert_eq!("ru".parse::<Locale>().unwrap(), Locale::Ru);
        assert_eq!("EN".parse::<Locale>().unwrap(), Locale::En);
        assert!("de".parse::<Locale>().is_err());
    }
}
