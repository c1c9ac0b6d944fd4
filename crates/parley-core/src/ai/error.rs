#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid server URL: {0}")]
    InvalidConfiguration(String),
    #[error("could not encode the request: {0}")]
    EncodingFailure(#[source] serde_json::Error),
    #[error("network error: {0}")]
    NetworkFailure(#[source] reqwest::Error),
    #[error("server error: {0}")]
    ServerError(u16),
    #[error("invalid response from server")]
    MalformedResponse,
}

impl ApiError {
    /// HTTP status for rejected requests.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ServerError(code) => Some(*code),
            _ => None,
        }
    }
}
