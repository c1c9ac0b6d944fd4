use chrono::{DateTime, Utc};
use parley_core::{clean_text, Command, Role};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use crate::app::{App, FocusPane};

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            // Consume the second *
            chars.next();

            // Push any accumulated plain text
            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;

            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Short "time ago" label for the sidebar.
fn format_relative(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);
    match seconds {
        0..=59 => "now".to_string(),
        60..=3_599 => format!("{} min ago", seconds / 60),
        3_600..=86_399 => format!("{} hr ago", seconds / 3_600),
        86_400..=604_799 => format!("{} d ago", seconds / 86_400),
        _ => then.format("%Y-%m-%d").to_string(),
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    let [sidebar_area, chat_column] = Layout::horizontal([
        Constraint::Length(32.min(body_area.width / 3)),
        Constraint::Min(0),
    ])
    .areas(body_area);

    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(chat_column);

    render_header(app, frame, header_area);
    render_sidebar(app, frame, sidebar_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.settings.is_some() {
        render_settings(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" parley ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(app.manager.server_url(), Style::default().fg(Color::Gray)),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let line = if let Some(status) = &app.status {
        Line::from(Span::styled(format!(" {status}"), Style::default().fg(Color::Green)))
    } else {
        let hints = match app.focus {
            FocusPane::Sidebar => " j/k move  Enter open  d delete  n new  Tab input  q quit",
            FocusPane::Input => " Enter send  Tab chats  PgUp/PgDn scroll  Ctrl-N new  Ctrl-S settings  Ctrl-C quit",
        };
        let commands: Vec<String> = Command::ALL
            .iter()
            .map(|c| format!("{} {}", c.as_str(), c.description()))
            .collect();
        Line::from(vec![
            Span::styled(hints, Style::default().fg(Color::Gray)),
            Span::styled(
                format!("  |  {}", commands.join("  ")),
                Style::default().fg(Color::DarkGray),
            ),
        ])
    };

    frame.render_widget(Paragraph::new(line), area);
}

fn render_sidebar(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Sidebar;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let now = Utc::now();
    let current = app.snapshot.current_id();

    let items: Vec<ListItem> = app
        .snapshot
        .conversations
        .iter()
        .map(|conversation| {
            let is_current = Some(conversation.id) == current;
            let marker = if app.snapshot.pending.contains(&conversation.id) {
                "… "
            } else if is_current {
                "● "
            } else {
                "  "
            };
            let title_style = if is_current {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(vec![
                Line::from(vec![
                    Span::raw(marker),
                    Span::styled(conversation.title.clone(), title_style),
                ]),
                Line::from(Span::styled(
                    format!(
                        "  {} · {} msgs",
                        format_relative(conversation.last_message_at, now),
                        conversation.messages().len()
                    ),
                    Style::default().fg(Color::DarkGray),
                )),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border_color))
                .title(format!(" Chats ({}) ", app.snapshot.conversations.len())),
        )
        .highlight_style(
            Style::default()
                .bg(if focused { Color::Cyan } else { Color::DarkGray })
                .fg(Color::Black),
        );

    frame.render_stateful_widget(list, area, &mut app.sidebar_state);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    let height = area.height.saturating_sub(2);
    let width = area.width.saturating_sub(2);
    if height != app.chat_height || width != app.chat_width {
        app.chat_height = height;
        app.chat_width = width;
        if app.follow_bottom {
            app.scroll_chat_to_bottom();
        }
    }

    let title = app
        .snapshot
        .current_conversation
        .as_ref()
        .map(|c| format!(" {} ", c.title))
        .unwrap_or_else(|| " No conversation ".to_string());

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(title);

    let pending = app.snapshot.is_current_pending();
    let messages = app.snapshot.messages();

    let text = if app.snapshot.current_conversation.is_none() {
        Text::from(Span::styled(
            "No conversation open. Press Ctrl-N to start one.",
            Style::default().fg(Color::DarkGray),
        ))
    } else if messages.is_empty() && !pending {
        Text::from(vec![
            Line::from(Span::styled("Welcome!", Style::default().fg(Color::Cyan).bold())),
            Line::default(),
            Line::from(Span::styled(
                "Type a message below and press Enter.",
                Style::default().fg(Color::DarkGray),
            )),
        ])
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in messages {
            let time = msg.timestamp().with_timezone(&chrono::Local).format("%H:%M");
            match msg.role() {
                Role::User => {
                    lines.push(Line::from(vec![
                        Span::styled("You:", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
                        Span::styled(format!(" {time}"), Style::default().fg(Color::DarkGray)),
                    ]));
                    for line in msg.content().lines() {
                        lines.push(Line::from(line.to_string()));
                    }
                }
                Role::Assistant => {
                    lines.push(Line::from(vec![
                        Span::styled("AI:", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
                        Span::styled(format!(" {time}"), Style::default().fg(Color::DarkGray)),
                    ]));
                    for line in clean_text(msg.content()).lines() {
                        lines.push(parse_markdown_line(line));
                    }
                }
            }
            lines.push(Line::default());
        }

        if pending {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Input && app.settings.is_none();
    let pending = app.snapshot.is_current_pending();
    let border_color = if focused { Color::Yellow } else { Color::DarkGray };
    let title = if pending { " Waiting for reply... " } else { " Message " };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width == 0 {
        0
    } else {
        (app.input_cursor + 1).saturating_sub(inner_width)
    };

    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);

    frame.render_widget(input, area);

    if focused {
        let cursor_x = (app.input_cursor - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_settings(app: &App, frame: &mut Frame, area: Rect) {
    let Some(form) = &app.settings else {
        return;
    };

    // Calculate popup size and position (centered)
    let popup_width = 64.min(area.width.saturating_sub(4));
    let popup_height = 10;

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height.min(area.height));

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Server Settings ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let [help_area, _, protocol_area, host_area, _, url_area, error_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(inner);

    frame.render_widget(
        Paragraph::new("Enter to save, Esc to cancel, Ctrl-P to switch protocol.")
            .style(Style::default().fg(Color::DarkGray)),
        help_area,
    );

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::raw("Protocol: "),
            Span::styled(form.protocol.as_str(), Style::default().fg(Color::Magenta).bold()),
        ])),
        protocol_area,
    );

    let label = "Host:     ";
    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::raw(label),
            Span::styled(form.host_input.clone(), Style::default().fg(Color::Cyan)),
        ])),
        host_area,
    );

    let preview = format!(
        "{}://{}/v1/chat/completions",
        form.protocol.as_str(),
        form.host_input.trim()
    );
    frame.render_widget(
        Paragraph::new(preview).style(Style::default().fg(Color::DarkGray)),
        url_area,
    );

    if let Some(error) = &form.error {
        frame.render_widget(
            Paragraph::new(error.as_str()).style(Style::default().fg(Color::Red)),
            error_area,
        );
    }

    let cursor_x = (label.len() + form.cursor).min(host_area.width as usize) as u16;
    frame.set_cursor_position((host_area.x + cursor_x, host_area.y));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn relative_times() {
        let now = Utc::now();
        assert_eq!(format_relative(now, now), "now");
        assert_eq!(format_relative(now - Duration::minutes(5), now), "5 min ago");
        assert_eq!(format_relative(now - Duration::hours(3), now), "3 hr ago");
        assert_eq!(format_relative(now - Duration::days(2), now), "2 d ago");
        // clock skew never reads as the future
        assert_eq!(format_relative(now + Duration::minutes(1), now), "now");
    }

    #[test]
    fn bold_markdown_becomes_styled_span() {
        let line = parse_markdown_line("a **bold** move");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "bold");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn unclosed_bold_stays_literal() {
        let line = parse_markdown_line("**oops");
        assert_eq!(line.spans.len(), 1);
        assert_eq!(line.spans[0].content, "**oops");
    }
}
