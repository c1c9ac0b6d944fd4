use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::{App, FocusPane};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {
            if app.follow_bottom {
                app.scroll_chat_to_bottom();
            }
        }
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Chat(snapshot) => app.apply_snapshot(snapshot),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys that work in any mode
    if ctrl && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }

    if app.settings.is_some() {
        handle_settings(app, key);
        return;
    }

    match key.code {
        KeyCode::Char('s') if ctrl => {
            app.open_settings();
            return;
        }
        KeyCode::Char('n') if ctrl => {
            app.new_conversation();
            return;
        }
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Sidebar => FocusPane::Input,
                FocusPane::Input => FocusPane::Sidebar,
            };
            return;
        }
        KeyCode::PageUp => {
            app.scroll_up(app.chat_height.max(2) / 2);
            return;
        }
        KeyCode::PageDown => {
            app.scroll_down(app.chat_height.max(2) / 2);
            return;
        }
        _ => {}
    }

    match app.focus {
        FocusPane::Sidebar => handle_sidebar(app, key),
        FocusPane::Input => handle_input(app, key),
    }
}

fn handle_sidebar(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('j') | KeyCode::Down => app.sidebar_down(),
        KeyCode::Char('k') | KeyCode::Up => app.sidebar_up(),
        KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => app.open_highlighted(),
        KeyCode::Char('d') | KeyCode::Delete => app.delete_highlighted(),
        KeyCode::Char('n') => app.new_conversation(),
        KeyCode::Esc => app.focus = FocusPane::Input,
        _ => {}
    }
}

fn handle_input(app: &mut App, key: KeyEvent) {
    app.status = None;

    match key.code {
        KeyCode::Esc => app.focus = FocusPane::Sidebar,
        KeyCode::Enter => app.submit_input(),
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.input_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => app.input_cursor = 0,
        KeyCode::End => app.input_cursor = app.input.chars().count(),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
            app.input.insert(byte_pos, c);
            app.input_cursor += 1;
        }
        _ => {}
    }
}

fn handle_settings(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    if key.code == KeyCode::Enter {
        app.save_settings();
        return;
    }

    let Some(form) = app.settings.as_mut() else {
        return;
    };

    match key.code {
        KeyCode::Esc => app.settings = None,
        KeyCode::Char('p') if ctrl => form.protocol = form.protocol.toggle(),
        KeyCode::Backspace => {
            if form.cursor > 0 {
                form.cursor -= 1;
                let byte_pos = char_to_byte_index(&form.host_input, form.cursor);
                form.host_input.remove(byte_pos);
                form.error = None;
            }
        }
        KeyCode::Left => form.cursor = form.cursor.saturating_sub(1),
        KeyCode::Right => {
            form.cursor = (form.cursor + 1).min(form.host_input.chars().count());
        }
        KeyCode::Home => form.cursor = 0,
        KeyCode::End => form.cursor = form.host_input.chars().count(),
        KeyCode::Char(c) if !ctrl && !c.is_whitespace() => {
            let byte_pos = char_to_byte_index(&form.host_input, form.cursor);
            form.host_input.insert(byte_pos, c);
            form.cursor += 1;
            form.error = None;
        }
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_up(3),
        MouseEventKind::ScrollDown => app.scroll_down(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use parley_core::{ApiError, ChatCompletion, ChatManager, ConversationStore, ServerConfig};

    struct Silent;

    #[async_trait]
    impl ChatCompletion for Silent {
        async fn complete(&self, _server: &ServerConfig, _content: &str) -> Result<String, ApiError> {
            Ok(String::new())
        }
    }

    #[test]
    fn resize_repins_only_when_following() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ChatManager::new(
            Arc::new(Silent),
            ConversationStore::in_dir(dir.path()),
            ServerConfig::new(),
        );
        manager.initialize();
        let mut app = App::new(Arc::new(manager));

        app.follow_bottom = false;
        app.chat_scroll = 7;
        handle_event(&mut app, AppEvent::Resize);
        assert_eq!(app.chat_scroll, 7);

        app.follow_bottom = true;
        handle_event(&mut app, AppEvent::Resize);
        assert_eq!(app.chat_scroll, 0);
    }

    #[test]
    fn char_index_handles_multibyte() {
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("abc", 10), 3);
        assert_eq!(char_to_byte_index("", 0), 0);
    }
}
