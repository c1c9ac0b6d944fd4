//! Durable conversation history.
//!
//! The whole list is written as one JSON snapshot on every change. Reads and
//! writes are best-effort: a broken or missing file means "no history", and a
//! failed write is logged and forgotten.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tracing::{debug, warn};

use crate::conversation::Conversation;

/// Storage key the snapshot is filed under.
pub const CONVERSATIONS_KEY: &str = "saved_conversations";

#[derive(Debug, Clone)]
pub struct ConversationStore {
    path: PathBuf,
}

impl ConversationStore {
    /// Store rooted in `dir`; the snapshot lives at `dir/saved_conversations.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{CONVERSATIONS_KEY}.json")),
        }
    }

    /// Store in the platform data directory (`~/.local/share/parley` on Linux).
    pub fn open_default() -> Result<Self> {
        Ok(Self::in_dir(data_dir()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Vec<Conversation> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no saved conversations");
            return Vec::new();
        }

        match self.read() {
            Ok(conversations) => {
                debug!(count = conversations.len(), "loaded conversations");
                conversations
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "discarding unreadable conversation history");
                Vec::new()
            }
        }
    }

    pub fn save_all(&self, conversations: &[Conversation]) {
        if let Err(e) = self.write(conversations) {
            warn!(path = %self.path.display(), error = %e, "failed to save conversations");
        }
    }

    fn read(&self) -> Result<Vec<Conversation>> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write(&self, conversations: &[Conversation]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string(conversations)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Directory for history and logs.
pub fn data_dir() -> Result<PathBuf> {
    let dir = dirs::data_dir().ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(dir.join("parley"))
}
