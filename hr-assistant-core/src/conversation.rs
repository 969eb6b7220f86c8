use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Message, Role};

pub const DEFAULT_TITLE: &str = "New conversation";
const TITLE_MAX_CHARS: usize = 40;

/// Coarse lifecycle of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Active,
}

/// Where the conversation is in the send/reply cycle.
///
/// A send appends the user message right away and moves to `Pending`. The
/// reply either lands as an assistant message (back to `Idle`) or the send
/// is marked `Failed`; the user message stays in both cases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SendState {
    #[default]
    Idle,
    #[serde(rename_all = "camelCase")]
    Pending { message_id: String },
    #[serde(rename_all = "camelCase")]
    Failed { message_id: String, error: String },
}

/// An ordered thread of messages tied to one provider/model selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub send_state: SendState,
}

impl Conversation {
    /// Creates an empty conversation for a provider/model pair
    pub fn new(provider_id: Option<String>, model: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            model,
            provider_id,
            send_state: SendState::Idle,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn phase(&self) -> Phase {
        if self.messages.is_empty() {
            Phase::Empty
        } else {
            Phase::Active
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Appends a message and bumps `updated_at`.
    ///
    /// The first user message also names a conversation that still carries
    /// the default title.
    pub fn push_message(&mut self, msg: Message) {
        if msg.role == Role::User
            && self.title == DEFAULT_TITLE
            && !self.messages.iter().any(|m| m.role == Role::User)
        {
            self.title = title_from(&msg.content);
        }
        // keep updated_at monotonic even if the clock steps backwards
        self.updated_at = msg.created_at.max(self.updated_at);
        self.messages.push(msg);
    }

    pub fn rename(&mut self, title: impl Into<String>) {
        let title = title.into();
        let trimmed = title.trim();
        self.title = if trimmed.is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            trimmed.to_string()
        };
        self.updated_at = Utc::now().max(self.updated_at);
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.send_state, SendState::Pending { .. })
    }

    pub fn failed_send(&self) -> Option<&str> {
        match &self.send_state {
            SendState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

fn title_from(content: &str) -> String {
    let line = content.lines().next().unwrap_or_default().trim();
    if line.is_empty() {
        return DEFAULT_TITLE.to_string();
    }
    if line.chars().count() <= TITLE_MAX_CHARS {
        line.to_string()
    } else {
        let mut title: String = line.chars().take(TITLE_MAX_CHARS).collect();
        title.push('…');
        title
    }
}
