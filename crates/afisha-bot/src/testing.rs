//! In-memory stand-ins for the HTTP collaborators.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use afisha::types::EventRecord;

use crate::api::EventFeed;
use crate::error::BotError;
use crate::telegram::Messenger;

/// Answers with scripted event lists; `None` stands for an unreachable API.
/// The last answer repeats once the script runs out.
pub(crate) struct FakeFeed {
    script: Mutex<VecDeque<Option<Vec<EventRecord>>>>,
    calls: AtomicUsize,
}

impl FakeFeed {
    pub(crate) fn fixed(answer: Option<Vec<EventRecord>>) -> Self {
        Self::script(vec![answer])
    }

    pub(crate) fn script(answers: Vec<Option<Vec<EventRecord>>>) -> Self {
        Self {
            script: Mutex::new(answers.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self) -> Option<Vec<EventRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().flatten()
        } else {
            script.front().cloned().flatten()
        }
    }
}

impl EventFeed for FakeFeed {
    fn fetch_events(&self) -> impl Future<Output = Result<Vec<EventRecord>, BotError>> + Send {
        let answer = self
            .next()
            .ok_or_else(|| BotError::Internal("feed unavailable".to_string()));
        async move { answer }
    }
}

/// Records every message; chats listed in `failing` get an error instead.
#[derive(Default)]
pub(crate) struct FakeMessenger {
    sent: Mutex<Vec<(i64, String)>>,
    pub(crate) failing: Vec<i64>,
}

impl FakeMessenger {
    pub(crate) fn failing_for(chats: &[i64]) -> Self {
        Self {
            sent: Mutex::default(),
            failing: chats.to_vec(),
        }
    }

    pub(crate) fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn last(&self) -> Option<(i64, String)> {
        self.sent.lock().unwrap().last().cloned()
    }
}

impl Messenger for FakeMessenger {
    fn send(&self, chat_id: i64, text: &str) -> impl Future<Output = Result<(), BotError>> + Send {
        let result = if self.failing.contains(&chat_id) {
            Err(BotError::Telegram(format!("chat {chat_id} blocked the bot")))
        } else {
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        };
        async move { result }
    }
}
