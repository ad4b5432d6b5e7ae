use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

use crate::error::Result;
use crate::funnel::{Component, Effect};

pub const DEFAULT_MAX_CHAT_MESSAGES: usize = 200;

/// Well-known context keys shared by the assistant and the runner.
pub mod keys {
    pub const APPLICANT_NAME: &str = "applicant_name";
    pub const AWAITING_NAME: &str = "awaiting_name";
    pub const AWAITING_INTEREST: &str = "awaiting_interest";
    pub const SANCTION_REFERENCE: &str = "sanction_reference";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Bot,
}

/// One entry of the chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<Component>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(body: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            body: body.into(),
            component: None,
            timestamp: Utc::now(),
        }
    }

    pub fn bot(body: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            body: body.into(),
            component: None,
            timestamp: Utc::now(),
        }
    }

    pub fn component(component: Component) -> Self {
        Self {
            sender: Sender::Bot,
            body: String::new(),
            component: Some(component),
            timestamp: Utc::now(),
        }
    }
}

/// Per-session data shared between the assistant and the funnel: a free-form
/// key/value bag plus a bounded chat transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    data: HashMap<String, Value>,
    #[serde(default)]
    messages: VecDeque<ChatMessage>,
    #[serde(default = "default_max_messages")]
    max_messages: usize,
}

fn default_max_messages() -> usize {
    DEFAULT_MAX_CHAT_MESSAGES
}

impl Context {
    pub fn new() -> Self {
        Self::with_max_chat_messages(DEFAULT_MAX_CHAT_MESSAGES)
    }

    pub fn with_max_chat_messages(max_messages: usize) -> Self {
        Self {
            data: HashMap::new(),
            messages: VecDeque::new(),
            max_messages: max_messages.max(1),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.data.insert(key.into(), value);
        Ok(())
    }

    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn data(&self) -> &HashMap<String, Value> {
        &self.data
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push_back(message);
        while self.messages.len() > self.max_messages {
            self.messages.pop_front();
        }
    }

    pub fn add_user_message(&mut self, body: impl Into<String>) {
        self.push_message(ChatMessage::user(body));
    }

    pub fn add_bot_message(&mut self, body: impl Into<String>) {
        self.push_message(ChatMessage::bot(body));
    }

    /// Records the user-visible part of funnel effects in the transcript.
    pub fn record_effects(&mut self, effects: &[Effect]) {
        for effect in effects {
            match effect {
                Effect::Say { text } => self.add_bot_message(text.clone()),
                Effect::Render { component } => {
                    self.push_message(ChatMessage::component(component.clone()))
                }
                Effect::Celebrate | Effect::GenerateSanctionLetter => {}
            }
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.back()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
