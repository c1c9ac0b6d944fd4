pub mod ai;
pub mod config;
pub mod conversation;
pub mod input;
pub mod manager;
pub mod markdown;
pub mod message;
pub mod state;
pub mod store;

// Re-export main types for convenience
pub use ai::{ApiError, ChatCompletion, ChatCompletionClient};
pub use config::{validate_host, ConfigStore, Protocol, ServerConfig};
pub use conversation::{Conversation, ConversationId, DEFAULT_TITLE};
pub use input::{parse_input, Command, Input};
pub use manager::{ChatManager, PendingSend};
pub use markdown::clean_text;
pub use message::{Message, MessageId, Role};
pub use state::ChatSnapshot;
pub use store::ConversationStore;
