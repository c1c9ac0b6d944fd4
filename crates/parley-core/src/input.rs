//! Classifies what the user typed before anything reaches the manager.
//!
//! Slash commands are matched exactly (case-sensitive, after trimming) and
//! never leave the client.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `/clear`: empty the current conversation.
    Clear,
    /// `/new`: start another conversation.
    New,
}

impl Command {
    pub const ALL: [Command; 2] = [Command::Clear, Command::New];

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Clear => "/clear",
            Command::New => "/new",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Command::Clear => "clear this chat",
            Command::New => "start a new chat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Command(Command),
    Message(String),
}

pub fn parse_input(raw: &str) -> Input {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }

    match Command::ALL.iter().find(|command| command.as_str() == trimmed) {
        Some(command) => Input::Command(*command),
        None => Input::Message(trimmed.to_string()),
    }
}
