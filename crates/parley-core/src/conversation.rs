use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::message::{Message, Role};

/// Title every conversation starts with until its first user message names it.
pub const DEFAULT_TITLE: &str = "New Conversation";

const TITLE_WORDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    /// Set by the first message ever appended; `clear` leaves it alone.
    #[serde(default)]
    started: bool,
}

impl Conversation {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            last_message_at: now,
            started: false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Appends `message` and bumps `last_message_at`.
    ///
    /// Only the very first message a conversation receives can name it, and
    /// only when that message is from the user. Clearing does not reopen
    /// naming.
    pub fn add_message(&mut self, message: Message) {
        let names_conversation = !self.started
            && self.messages.is_empty()
            && self.title == DEFAULT_TITLE
            && message.role() == Role::User;

        if names_conversation {
            self.title = derive_title(message.content());
        }

        self.messages.push(message);
        self.started = true;
        self.last_message_at = Utc::now();
    }

    /// Drops every message. Title and timestamps stay as they are.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

fn derive_title(content: &str) -> String {
    let words: Vec<&str> = content.split_whitespace().take(TITLE_WORDS).collect();
    if words.len() > 1 {
        words.join(" ")
    } else {
        content.trim().to_string()
    }
}
