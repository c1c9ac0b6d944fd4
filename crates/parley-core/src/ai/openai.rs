use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ApiError, ChatCompletion};
use crate::config::ServerConfig;

pub const MODEL: &str = "mistral";
pub const MAX_TOKENS: u32 = 1000;
pub const TEMPERATURE: f64 = 0.7;

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

/// Non-streaming client for `/v1/chat/completions` on an OpenAI-compatible server.
///
/// Holds no server settings of its own; every call is told where to go, so a
/// settings change takes effect on the next request.
#[derive(Clone, Default)]
pub struct ChatCompletionClient {
    client: Client,
}

impl ChatCompletionClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ChatCompletion for ChatCompletionClient {
    async fn complete(&self, server: &ServerConfig, content: &str) -> Result<String, ApiError> {
        let endpoint = server.endpoint_url();
        let url = Url::parse(&endpoint).map_err(|_| ApiError::InvalidConfiguration(endpoint.clone()))?;
        let body = encode_request(content)?;

        debug!(%url, "sending chat completion");

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", server.bearer_token()))
            .body(body)
            .send()
            .await
            .map_err(ApiError::NetworkFailure)?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "chat completion rejected");
            return Err(ApiError::ServerError(status.as_u16()));
        }

        let text = response.text().await.map_err(ApiError::NetworkFailure)?;
        parse_response(&text)
    }
}

fn encode_request(content: &str) -> Result<Vec<u8>, ApiError> {
    let request = OpenAIRequest {
        model: MODEL,
        messages: vec![OpenAIMessage {
            role: "user",
            content,
        }],
        max_tokens: MAX_TOKENS,
        temperature: TEMPERATURE,
    };

    serde_json::to_vec(&request).map_err(ApiError::EncodingFailure)
}

fn parse_response(text: &str) -> Result<String, ApiError> {
    let openai_response: OpenAIResponse =
        serde_json::from_str(text).map_err(|_| ApiError::MalformedResponse)?;

    openai_response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or(ApiError::MalformedResponse)
}
