//! Plain-text rendering of event lists for chat messages.
//!
//! Every event becomes three lines followed by two blank ones:
//!
//! ```text
//! Date: 2026-10-17
//! Name: Meetup A
//! Site: https://events.yandex.ru/e/1
//! ```

use std::str::FromStr;

use chrono::{Datelike, NaiveDate};

use crate::date::{month_name, weekday_short};
use crate::types::{EventRecord, Locale};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateStyle {
    /// `2026-10-17`
    #[default]
    Iso,
    /// `Sat, 17 October` or `сб, 17 октября`
    Long,
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid date style '{0}'. Accepted values: 'iso', 'long'")]
pub struct DateStyleParseError(String);

impl FromStr for DateStyle {
    type Err = DateStyleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "iso" => Ok(DateStyle::Iso),
            "long" => Ok(DateStyle::Long),
            _ => Err(DateStyleParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub locale: Locale,
    pub date_style: DateStyle,
}

impl RenderOptions {
    pub fn new(locale: Locale, date_style: DateStyle) -> Self {
        Self { locale, date_style }
    }
}

struct Labels {
    date: &'static str,
    name: &'static str,
    site: &'static str,
    pending: &'static str,
}

fn labels(locale: Locale) -> Labels {
    match locale {
        Locale::En => Labels {
            date: "Date",
            name: "Name",
            site: "Site",
            pending: "to be announced",
        },
        Locale::Ru => Labels {
            date: "Дата",
            name: "Название",
            site: "Сайт",
            pending: "Дата уточняется",
        },
    }
}

pub fn format_date(date: Option<NaiveDate>, options: RenderOptions) -> String {
    let Some(date) = date else {
        return labels(options.locale).pending.to_string();
    };

    match (options.date_style, options.locale) {
        (DateStyle::Iso, _) => date.format("%Y-%m-%d").to_string(),
        (DateStyle::Long, Locale::En) => date.format("%a, %d %B").to_string(),
        (DateStyle::Long, Locale::Ru) => format!(
            "{}, {:02} {}",
            weekday_short(date.weekday()),
            date.day(),
            month_name(date.month()).unwrap_or_default()
        ),
    }
}

pub fn render_event(record: &EventRecord, options: RenderOptions) -> String {
    let labels = labels(options.locale);
    format!(
        "{}: {}\n{}: {}\n{}: {}\n\n\n",
        labels.date,
        format_date(record.date, options),
        labels.name,
        record.name,
        labels.site,
        record.site
    )
}

pub fn render_events<'a>(
    records: impl IntoIterator<Item = &'a EventRecord>,
    options: RenderOptions,
) -> String {
    records.into_iter().fold(String::new(), |mut out, record| {
        out.push_str(&render_event(record, options));
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_style_from_str() {
        assert_eq!("iso".parse::<DateStyle>().unwrap(), DateStyle::Iso);
        assert_eq!(" Long ".parse::<DateStyle>().unwrap(), DateStyle::Long);
        assert!("short".parse::<DateStyle>().is_err());
    }

    fn meetup() -> EventRecord {
        EventRecord::new(
            NaiveDate::from_ymd_opt(2026, 10, 17),
            "Meetup A",
            "https://events.yandex.ru/e/1",
        )
    }

    #[test]
    fn test_render_event_default() {
        assert_eq!(
            render_event(&meetup(), RenderOptions::default()),
            "Date: 2026-10-17\nName: Meetup A\nSite: https://events.yandex.ru/e/1\n\n\n"
        );
    }

    #[test]
    fn test_render_events_concatenates() {
        let pending = EventRecord::new(None, "Meetup B", "https://events.yandex.ru/e/2");
        let text = render_events(&[meetup(), pending], RenderOptions::default());

        assert_eq!(
            text,
            "Date: 2026-10-17\nName: Meetup A\nSite: https://events.yandex.ru/e/1\n\n\n\
             Date: to be announced\nName: Meetup B\nSite: https://events.yandex.ru/e/2\n\n\n"
        );
        let none: [EventRecord; 0] = [];
        assert_eq!(render_events(&none, RenderOptions::default()), "");
    }

    #[test]
    fn test_render_russian_long() {
        let options = RenderOptions::new(Locale::Ru, DateStyle::Long);
        assert_eq!(
            render_event(&meetup(), options),
            "Дата: сб, 17 октября\nНазвание: Meetup A\nСайт: https://events.yandex.ru/e/1\n\n\n"
        );
    }

    #[test]
    fn test_format_date_styles() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2);
        assert_eq!(
            format_date(date, RenderOptions::new(Locale::En, DateStyle::Long)),
            "Mon, 02 March"
        );
        assert_eq!(
            format_date(date, RenderOptions::new(Locale::Ru, DateStyle::Long)),
            "пн, 02 марта"
        );
        assert_eq!(
            format_date(None, RenderOptions::new(Locale::Ru, DateStyle::Iso)),
            "Дата уточняется"
        );
    }
}
