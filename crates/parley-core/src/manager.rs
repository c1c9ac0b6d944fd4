//! The chat orchestrator.
//!
//! `ChatManager` owns every conversation, runs the send/reply cycle and
//! publishes a [`ChatSnapshot`] after each change. Share it behind an `Arc`;
//! its state lock is never held across the network call, so the UI stays free
//! to switch or delete conversations while a reply is pending.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::ai::{ApiError, ChatCompletion};
use crate::config::{ConfigStore, Protocol, ServerConfig};
use crate::conversation::{Conversation, ConversationId};
use crate::message::Message;
use crate::state::ChatSnapshot;
use crate::store::ConversationStore;

struct ChatState {
    conversations: Vec<Conversation>,
    current: Option<ConversationId>,
    in_flight: HashSet<ConversationId>,
    server: ServerConfig,
}

impl ChatState {
    fn find(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn find_mut(&mut self, id: ConversationId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            conversations: self.conversations.clone(),
            current_conversation: self.current.and_then(|id| self.find(id)).cloned(),
            is_loading: !self.in_flight.is_empty(),
            pending: self.in_flight.iter().copied().collect(),
        }
    }
}

/// A user turn that has been recorded and is waiting on the server.
#[derive(Debug)]
pub struct PendingSend {
    conversation_id: ConversationId,
    server: ServerConfig,
    content: String,
}

impl PendingSend {
    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }
}

pub struct ChatManager {
    client: Arc<dyn ChatCompletion>,
    store: ConversationStore,
    config_store: Option<ConfigStore>,
    state: Mutex<ChatState>,
    updates: watch::Sender<ChatSnapshot>,
}

impl ChatManager {
    pub fn new(client: Arc<dyn ChatCompletion>, store: ConversationStore, server: ServerConfig) -> Self {
        let (updates, _) = watch::channel(ChatSnapshot::default());
        Self {
            client,
            store,
            config_store: None,
            state: Mutex::new(ChatState {
                conversations: Vec::new(),
                current: None,
                in_flight: HashSet::new(),
                server,
            }),
            updates,
        }
    }

    /// Persist server settings changes to `config_store`.
    pub fn with_config_store(mut self, config_store: ConfigStore) -> Self {
        self.config_store = Some(config_store);
        self
    }

    /// Loads saved history and opens a fresh conversation on top of it.
    /// The app always starts on a blank conversation.
    pub fn initialize(&self) {
        {
            let mut state = self.lock();
            state.conversations = self.store.load();
            state.current = None;
            info!(count = state.conversations.len(), "conversation history loaded");
        }
        self.create_new_conversation();
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.lock().snapshot()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.lock().conversations.clone()
    }

    pub fn current_conversation(&self) -> Option<Conversation> {
        let state = self.lock();
        state.current.and_then(|id| state.find(id)).cloned()
    }

    pub fn is_loading(&self) -> bool {
        !self.lock().in_flight.is_empty()
    }

    pub fn create_new_conversation(&self) -> ConversationId {
        let mut state = self.lock();
        let conversation = Conversation::new();
        let id = conversation.id;
        state.conversations.insert(0, conversation);
        state.current = Some(id);
        debug!(%id, "created conversation");
        self.commit(&state, true);
        id
    }

    /// Makes `id` current. Returns false for unknown ids.
    pub fn select_conversation(&self, id: ConversationId) -> bool {
        let mut state = self.lock();
        if state.find(id).is_none() {
            return false;
        }
        state.current = Some(id);
        self.commit(&state, false);
        true
    }

    /// Removes `id`. Deleting the current conversation moves the selection to
    /// the first remaining one. A reply still pending for it is dropped.
    pub fn delete_conversation(&self, id: ConversationId) -> bool {
        let mut state = self.lock();
        let before = state.conversations.len();
        state.conversations.retain(|c| c.id != id);
        if state.conversations.len() == before {
            return false;
        }

        if state.current == Some(id) {
            state.current = state.conversations.first().map(|c| c.id);
        }
        debug!(%id, "deleted conversation");
        self.commit(&state, true);
        true
    }

    pub fn clear_current_chat(&self) {
        let mut state = self.lock();
        let Some(id) = state.current else {
            return;
        };
        let Some(conversation) = state.find_mut(id) else {
            return;
        };
        conversation.clear();
        self.commit(&state, true);
    }

    /// Sends `text` from the current conversation and records the reply.
    ///
    /// Returns the assistant message appended, which carries the error
    /// description when the request failed. Returns `None` without doing
    /// anything when there is no current conversation or it is already
    /// waiting on a reply; also `None` when the conversation was deleted
    /// before the reply arrived.
    pub async fn send_message(&self, text: &str) -> Option<Message> {
        let pending = self.begin_send(text)?;
        self.finish_send(pending).await
    }

    /// First half of [`send_message`](Self::send_message): appends the user
    /// turn and marks the conversation as waiting, without touching the
    /// network. `None` means nothing was recorded.
    pub fn begin_send(&self, text: &str) -> Option<PendingSend> {
        let mut state = self.lock();
        let id = state.current?;
        if state.in_flight.contains(&id) {
            debug!(%id, "request already in flight, ignoring send");
            return None;
        }

        state.find_mut(id)?.add_message(Message::user(text));
        state.in_flight.insert(id);
        self.commit(&state, true);
        Some(PendingSend {
            conversation_id: id,
            server: state.server.clone(),
            content: text.to_string(),
        })
    }

    /// Second half of [`send_message`](Self::send_message): waits for the
    /// reply and appends it to the conversation the request came from.
    pub async fn finish_send(&self, pending: PendingSend) -> Option<Message> {
        let PendingSend {
            conversation_id,
            server,
            content,
        } = pending;

        let reply = match self.client.complete(&server, &content).await {
            Ok(content) => Message::assistant(content),
            Err(e) => {
                warn!(conversation = %conversation_id, error = %e, "chat completion failed");
                Message::assistant(error_reply(&e))
            }
        };

        let mut state = self.lock();
        state.in_flight.remove(&conversation_id);
        let delivered = match state.find_mut(conversation_id) {
            Some(conversation) => {
                conversation.add_message(reply.clone());
                true
            }
            None => false,
        };
        self.commit(&state, delivered);

        if !delivered {
            info!(conversation = %conversation_id, "conversation deleted before reply arrived");
            return None;
        }
        Some(reply)
    }

    pub fn server_config(&self) -> ServerConfig {
        self.lock().server.clone()
    }

    /// Full completions endpoint the next request will hit.
    pub fn server_url(&self) -> String {
        self.lock().server.endpoint_url()
    }

    pub fn update_server_url(&self, host_and_port: &str) {
        let mut state = self.lock();
        state.server.host_and_port = host_and_port.to_string();
        self.save_server(&state.server);
    }

    pub fn update_server_protocol(&self, protocol: Protocol) {
        let mut state = self.lock();
        state.server.protocol = protocol;
        self.save_server(&state.server);
    }

    fn save_server(&self, server: &ServerConfig) {
        info!(url = %server.endpoint_url(), "server settings changed");
        if let Some(config_store) = &self.config_store {
            if let Err(e) = config_store.save(server) {
                warn!(error = %e, "failed to save server settings");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commit(&self, state: &ChatState, persist: bool) {
        if persist {
            self.store.save_all(&state.conversations);
        }
        self.updates.send_replace(state.snapshot());
    }
}

/// The assistant turn shown in place of a reply when the request fails.
pub fn error_reply(error: &ApiError) -> String {
    format!("Sorry, an error occurred: {error}")
}
