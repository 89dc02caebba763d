use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{error, info, warn};

pub const STATUS_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusMessage {
    pub severity: Severity,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusView {
    pub latest: Option<StatusMessage>,
    /// Newest first.
    pub history: Vec<StatusMessage>,
}

/// User-visible status indicator. Every post is mirrored to `tracing`.
#[derive(Debug, Default)]
pub struct StatusBoard {
    messages: Mutex<VecDeque<StatusMessage>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self, text: impl Into<String>) {
        let text = text.into();
        info!("{}", text);
        self.post(Severity::Info, text);
    }

    pub fn warn(&self, text: impl Into<String>) {
        let text = text.into();
        warn!("{}", text);
        self.post(Severity::Warning, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        let text = text.into();
        error!("{}", text);
        self.post(Severity::Error, text);
    }

    fn post(&self, severity: Severity, text: String) {
        let mut messages = self.messages.lock();
        messages.push_front(StatusMessage {
            severity,
            text,
            at: Utc::now(),
        });
        messages.truncate(STATUS_HISTORY_LIMIT);
    }

    pub fn latest(&self) -> Option<StatusMessage> {
        self.messages.lock().front().cloned()
    }

    pub fn view(&self) -> StatusView {
        let messages = self.messages.lock();
        StatusView {
            latest: messages.front().cloned(),
            history: messages.iter().cloned().collect(),
        }
    }
}
