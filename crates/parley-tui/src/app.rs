use std::sync::Arc;

use parley_core::{
    clean_text, parse_input, validate_host, ChatManager, ChatSnapshot, Command, ConversationId,
    Input, Protocol,
};
use ratatui::widgets::ListState;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Sidebar,
    Input,
}

/// The settings popup: server host and protocol.
#[derive(Debug, Clone)]
pub struct SettingsForm {
    pub host_input: String,
    pub cursor: usize,
    pub protocol: Protocol,
    pub error: Option<String>,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub focus: FocusPane,
    pub manager: Arc<ChatManager>,
    pub snapshot: ChatSnapshot,

    // Sidebar
    pub sidebar_state: ListState,

    // Input box
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars

    // Chat pane
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub follow_bottom: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Popups and notices
    pub settings: Option<SettingsForm>,
    pub status: Option<String>,
}

impl App {
    pub fn new(manager: Arc<ChatManager>) -> Self {
        let snapshot = manager.snapshot();
        let mut app = Self {
            should_quit: false,
            focus: FocusPane::Input,
            manager,
            snapshot: ChatSnapshot::default(),

            sidebar_state: ListState::default(),

            input: String::new(),
            input_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_bottom: true,

            animation_frame: 0,

            settings: None,
            status: None,
        };
        app.apply_snapshot(snapshot);
        app
    }

    /// Takes new manager state and keeps the sidebar highlight on the current
    /// conversation when the current one changed.
    pub fn apply_snapshot(&mut self, snapshot: ChatSnapshot) {
        let switched = snapshot.current_id() != self.snapshot.current_id();
        self.snapshot = snapshot;

        let len = self.snapshot.conversations.len();
        if switched || self.sidebar_state.selected().is_none() {
            let current = self
                .snapshot
                .current_id()
                .and_then(|id| self.snapshot.position_of(id));
            self.sidebar_state.select(current.or((len > 0).then_some(0)));
            self.follow_bottom = true;
        } else if let Some(i) = self.sidebar_state.selected() {
            self.sidebar_state
                .select(if len == 0 { None } else { Some(i.min(len - 1)) });
        }

        if self.follow_bottom {
            self.scroll_chat_to_bottom();
        }
    }

    pub fn tick_animation(&mut self) {
        if self.snapshot.is_current_pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Sidebar actions
    pub fn sidebar_down(&mut self) {
        let len = self.snapshot.conversations.len();
        if len > 0 {
            let i = self.sidebar_state.selected().unwrap_or(0);
            self.sidebar_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn sidebar_up(&mut self) {
        let i = self.sidebar_state.selected().unwrap_or(0);
        self.sidebar_state.select(Some(i.saturating_sub(1)));
    }

    pub fn highlighted_conversation(&self) -> Option<ConversationId> {
        self.sidebar_state
            .selected()
            .and_then(|i| self.snapshot.conversations.get(i))
            .map(|c| c.id)
    }

    pub fn open_highlighted(&mut self) {
        if let Some(id) = self.highlighted_conversation() {
            self.manager.select_conversation(id);
            self.apply_snapshot(self.manager.snapshot());
            self.focus = FocusPane::Input;
        }
    }

    pub fn delete_highlighted(&mut self) {
        if let Some(id) = self.highlighted_conversation() {
            self.manager.delete_conversation(id);
            self.apply_snapshot(self.manager.snapshot());
        }
    }

    pub fn new_conversation(&mut self) {
        self.manager.create_new_conversation();
        self.apply_snapshot(self.manager.snapshot());
        self.focus = FocusPane::Input;
    }

    /// Handles Enter in the input box: commands run locally, anything else is
    /// sent in the background. Empty input is refused.
    pub fn submit_input(&mut self) {
        match parse_input(&self.input) {
            Input::Empty => return,
            Input::Command(Command::Clear) => {
                self.manager.clear_current_chat();
                self.status = Some("Chat cleared".to_string());
            }
            Input::Command(Command::New) => {
                self.manager.create_new_conversation();
            }
            Input::Message(text) => {
                if self.snapshot.current_id().is_none() {
                    self.status = Some("No conversation open. Press Ctrl-N to start one.".to_string());
                    return;
                }
                // refused while a reply is pending; the draft stays put
                let Some(pending) = self.manager.begin_send(&text) else {
                    self.apply_snapshot(self.manager.snapshot());
                    return;
                };
                debug!(chars = text.chars().count(), "sending message");
                let manager = self.manager.clone();
                tokio::spawn(async move {
                    manager.finish_send(pending).await;
                });
            }
        }

        self.input.clear();
        self.input_cursor = 0;
        self.follow_bottom = true;
        self.apply_snapshot(self.manager.snapshot());
    }

    // Settings popup
    pub fn open_settings(&mut self) {
        let server = self.manager.server_config();
        self.settings = Some(SettingsForm {
            cursor: server.host_and_port.chars().count(),
            host_input: server.host_and_port,
            protocol: server.protocol,
            error: None,
        });
    }

    pub fn save_settings(&mut self) {
        let Some(form) = self.settings.as_mut() else {
            return;
        };

        let host = form.host_input.trim().to_string();
        if !validate_host(&host) {
            form.error = Some(
                "Enter host:port, e.g. 192.168.1.100:8080 or example.ngrok.io:80".to_string(),
            );
            return;
        }

        self.manager.update_server_url(&host);
        self.manager.update_server_protocol(form.protocol);
        self.status = Some(format!("Settings saved. New URL: {}", self.manager.server_url()));
        self.settings = None;
    }

    // Chat scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max_scroll = self.chat_line_count().saturating_sub(self.visible_chat_height());
        self.chat_scroll = (self.chat_scroll + lines).min(max_scroll);
        self.follow_bottom = self.chat_scroll >= max_scroll;
    }

    /// Scroll chat to bottom so the latest reply or "Thinking..." is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        self.chat_scroll = self
            .chat_line_count()
            .saturating_sub(self.visible_chat_height());
    }

    fn visible_chat_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    /// Rough count of wrapped lines the chat pane renders.
    fn chat_line_count(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: usize = 0;
        for msg in self.snapshot.messages() {
            total_lines += 1; // Role line ("You:" or "AI:")
            for line in clean_text(msg.content()).lines() {
                total_lines += line.chars().count() / wrap_width + 1;
            }
            total_lines += 1; // Blank line after message
        }

        if self.snapshot.is_current_pending() {
            total_lines += 2; // "AI:" + "Thinking..."
        }

        u16::try_from(total_lines).unwrap_or(u16::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_core::{ApiError, ChatCompletion, ConversationStore, Role, ServerConfig};

    struct Echo;

    #[async_trait]
    impl ChatCompletion for Echo {
        async fn complete(&self, _server: &ServerConfig, content: &str) -> Result<String, ApiError> {
            Ok(format!("you said {content}"))
        }
    }

    fn app() -> (App, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let manager = ChatManager::new(
            Arc::new(Echo),
            ConversationStore::in_dir(dir.path()),
            ServerConfig::new(),
        );
        manager.initialize();
        (App::new(Arc::new(manager)), dir)
    }

    #[tokio::test]
    async fn blank_input_is_not_sent() {
        let (mut app, _dir) = app();
        app.input = "   ".to_string();
        app.submit_input();
        tokio::task::yield_now().await;
        assert!(app.manager.current_conversation().unwrap().is_empty());
        assert_eq!(app.input, "   ");
    }

    #[tokio::test]
    async fn clear_command_never_reaches_the_conversation() {
        let (mut app, _dir) = app();
        app.manager.send_message("hello there").await.unwrap();

        app.input = " /clear ".to_string();
        app.submit_input();

        let current = app.manager.current_conversation().unwrap();
        assert!(current.is_empty());
        assert_eq!(current.title, "hello there");
        assert!(app.input.is_empty());
    }

    #[tokio::test]
    async fn new_command_opens_a_conversation() {
        let (mut app, _dir) = app();
        app.input = "/new".to_string();
        app.submit_input();

        assert_eq!(app.snapshot.conversations.len(), 2);
        assert_eq!(app.sidebar_state.selected(), Some(0));
    }

    #[tokio::test]
    async fn message_is_sent_in_the_background() {
        let (mut app, _dir) = app();
        let mut updates = app.manager.subscribe();

        app.input = "  ping  ".to_string();
        app.submit_input();
        assert!(app.input.is_empty());

        let snapshot = updates
            .wait_for(|s| s.messages().len() == 2)
            .await
            .unwrap()
            .clone();
        let messages = snapshot.messages();
        assert_eq!(messages[0].role(), Role::User);
        assert_eq!(messages[0].content(), "ping");
        assert_eq!(messages[1].content(), "you said ping");
    }

    struct Stalled(Arc<tokio::sync::Notify>);

    #[async_trait]
    impl ChatCompletion for Stalled {
        async fn complete(&self, _server: &ServerConfig, content: &str) -> Result<String, ApiError> {
            self.0.notified().await;
            Ok(format!("late {content}"))
        }
    }

    #[tokio::test]
    async fn second_submit_keeps_draft_while_reply_pending() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(tokio::sync::Notify::new());
        let manager = ChatManager::new(
            Arc::new(Stalled(gate.clone())),
            ConversationStore::in_dir(dir.path()),
            ServerConfig::new(),
        );
        manager.initialize();
        let mut app = App::new(Arc::new(manager));

        // both submits happen before the spawned request gets to run
        app.input = "first".to_string();
        app.submit_input();
        app.input = "second".to_string();
        app.submit_input();

        assert_eq!(app.input, "second");
        let messages: Vec<String> = app
            .manager
            .snapshot()
            .messages()
            .iter()
            .map(|m| m.content().to_string())
            .collect();
        assert_eq!(messages, vec!["first"]);
        assert!(app.snapshot.is_current_pending());

        let mut updates = app.manager.subscribe();
        gate.notify_one();
        updates.wait_for(|s| !s.is_loading).await.unwrap();
        assert_eq!(app.manager.snapshot().messages()[1].content(), "late first");
    }

    #[tokio::test]
    async fn sidebar_follows_deletes() {
        let (mut app, _dir) = app();
        app.new_conversation();
        app.new_conversation();
        assert_eq!(app.snapshot.conversations.len(), 3);

        app.sidebar_state.select(Some(2));
        app.delete_highlighted();
        assert_eq!(app.snapshot.conversations.len(), 2);
        assert_eq!(app.sidebar_state.selected(), Some(1));

        app.sidebar_up();
        app.open_highlighted();
        assert_eq!(
            app.snapshot.current_id(),
            Some(app.snapshot.conversations[0].id)
        );
    }

    #[tokio::test]
    async fn invalid_host_keeps_settings_open() {
        let (mut app, _dir) = app();
        app.open_settings();
        if let Some(form) = app.settings.as_mut() {
            form.host_input = "no port here".to_string();
        }
        app.save_settings();

        let form = app.settings.as_ref().unwrap();
        assert!(form.error.is_some());
        assert_eq!(app.manager.server_config(), ServerConfig::new());
    }

    #[tokio::test]
    async fn valid_settings_update_the_endpoint() {
        let (mut app, _dir) = app();
        app.open_settings();
        if let Some(form) = app.settings.as_mut() {
            form.host_input = "10.0.0.2:8000".to_string();
            form.protocol = Protocol::Https;
        }
        app.save_settings();

        assert!(app.settings.is_none());
        assert_eq!(
            app.manager.server_url(),
            "https://10.0.0.2:8000/v1/chat/completions"
        );
    }
}
