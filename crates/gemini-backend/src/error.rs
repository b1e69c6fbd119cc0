//! Error types for the Gemini backend

use fusion_engine::ServiceError;
use thiserror::Error;

/// Result type alias using GeminiError
pub type Result<T> = std::result::Result<T, GeminiError>;

/// Errors raised while talking to the Gemini API
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("API key is not configured; set GEMINI_API_KEY")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with an error payload
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("no image was generated by the model")]
    NoImage,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A request precondition failed before anything was sent
    #[error("{0}")]
    InvalidRequest(String),
}

impl From<GeminiError> for ServiceError {
    fn from(err: GeminiError) -> Self {
        ServiceError::new(err.to_string())
    }
}
