pub mod error;
pub mod openai;

use async_trait::async_trait;

use crate::config::ServerConfig;

pub use error::ApiError;
pub use openai::ChatCompletionClient;

/// Turns one user message into one assistant reply.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, server: &ServerConfig, content: &str) -> Result<String, ApiError>;
}
