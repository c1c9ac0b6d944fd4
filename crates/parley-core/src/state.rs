//! UI-agnostic application state types
//!
//! This module contains data structures that are shared between different UIs
//! and don't depend on any specific UI framework.

use crate::conversation::{Conversation, ConversationId};
use crate::message::Message;

/// What a renderer needs to draw the chat, published after every change.
#[derive(Debug, Clone, Default)]
pub struct ChatSnapshot {
    /// Most recently created first.
    pub conversations: Vec<Conversation>,
    pub current_conversation: Option<Conversation>,
    /// True while any completion request is outstanding.
    pub is_loading: bool,
    /// Conversations with a request in flight.
    pub pending: Vec<ConversationId>,
}

impl ChatSnapshot {
    pub fn current_id(&self) -> Option<ConversationId> {
        self.current_conversation.as_ref().map(|c| c.id)
    }

    /// Messages of the current conversation, or none.
    pub fn messages(&self) -> &[Message] {
        self.current_conversation
            .as_ref()
            .map(|c| c.messages())
            .unwrap_or_default()
    }

    /// Whether the current conversation is waiting on a reply.
    pub fn is_current_pending(&self) -> bool {
        self.current_id()
            .is_some_and(|id| self.pending.contains(&id))
    }

    pub fn position_of(&self, id: ConversationId) -> Option<usize> {
        self.conversations.iter().position(|c| c.id == id)
    }
}
