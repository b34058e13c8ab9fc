use afisha::types::Locale;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    AllEvents,
    Subscribe,
    Unsubscribe,
    Unknown,
}

impl Command {
    /// Button labels of every locale are understood, whatever locale the bot
    /// answers in.
    pub fn parse(text: &str) -> Command {
        let text = text.trim();
        let command = text.split_whitespace().next().unwrap_or_default();
        if command == "/start" || command.starts_with("/start@") {
            return Command::Start;
        }

        let text = text.to_lowercase();
        for replies in [&EN, &RU] {
            if text == replies.button_all.to_lowercase() {
                return Command::AllEvents;
            }
            if text == replies.button_subscribe.to_lowercase() {
                return Command::Subscribe;
            }
            if text == replies.button_unsubscribe.to_lowercase() {
                return Command::Unsubscribe;
            }
        }
        Command::Unknown
    }
}

/// Fixed texts the bot answers with. HTML is allowed.
#[derive(Debug)]
pub struct Replies {
    pub greeting: &'static str,
    pub subscribed: &'static str,
    pub already_subscribed: &'static str,
    pub unsubscribed: &'static str,
    pub not_subscribed: &'static str,
    pub unknown: &'static str,
    pub no_events: &'static str,
    pub unavailable: &'static str,
    pub button_all: &'static str,
    pub button_subscribe: &'static str,
    pub button_unsubscribe: &'static str,
}

pub const EN: Replies = Replies {
    greeting: "Hi! This bot keeps you posted about Yandex events.\n\
               <u>all events</u> - see the upcoming events\n\
               <u>subscribe</u> - get a message whenever the list changes\n\
               <u>unsubscribe</u> - stop those messages",
    subscribed: "You are now subscribed to updates",
    already_subscribed: "You are already subscribed to updates",
    unsubscribed: "You have unsubscribed from updates",
    not_subscribed: "You are not subscribed to updates",
    unknown: "Unknown command",
    no_events: "There are no upcoming events",
    unavailable: "The event list is unavailable right now, please try again later",
    button_all: "all events",
    button_subscribe: "subscribe",
    button_unsubscribe: "unsubscribe",
};

pub const RU: Replies = Replies {
    greeting: "Привет! Это бот для получения информации о событиях Яндекса.\n\
               <u>Все мероприятия</u> - узнать об актуальных событиях\n\
               <u>Подписаться</u> - получать сообщения при обновлении информации.\n\
               <u>Отписаться</u> - отписаться от уведомлений.",
    subscribed: "Вы успешно подписались на обновления",
    already_subscribed: "Вы уже подписаны на обновления",
    unsubscribed: "Вы отписались от обновлений",
    not_subscribed: "Вы не подписаны на обновления",
    unknown: "Неизвестная команда",
    no_events: "Ближайших мероприятий нет",
    unavailable: "Список мероприятий сейчас недоступен, попробуйте позже",
    button_all: "Все мероприятия",
    button_subscribe: "Подписаться",
    button_unsubscribe: "Отписаться",
};

pub fn replies(locale: Locale) -> &'static Replies {
    match locale {
        Locale::En => &EN,
        Locale::Ru => &RU,
    }
}
