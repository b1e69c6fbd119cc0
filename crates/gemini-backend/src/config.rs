//! Configuration for the Gemini backend

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GeminiError, Result};

/// Environment variable holding the API key
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
/// Environment variable overriding the API base URL
pub const BASE_URL_VAR: &str = "GEMINI_BASE_URL";

/// Default values
pub mod defaults {
    pub const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
    /// Model for analysis, style extraction, text rewriting and suggestions
    pub const TEXT_MODEL: &str = "gemini-2.5-flash";
    /// Model for image-to-image generation
    pub const IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
    /// Model for text-to-image generation
    pub const IMAGEN_MODEL: &str = "imagen-4.0-generate-001";
    pub const REQUEST_TIMEOUT_SECS: u64 = 120;
}

/// Connection settings for the Gemini API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Base URL including the API version segment
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub imagen_model: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl GeminiConfig {
    /// Config with the given key and default endpoints
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Read the key (required) and base URL (optional) from the environment
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty() && k != "undefined")
            .ok_or(GeminiError::MissingApiKey)?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var(BASE_URL_VAR) {
            if !base_url.trim().is_empty() {
                config.base_url = base_url.trim_end_matches('/').to_string();
            }
        }
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// URL of a model method, e.g. `generateContent`
    pub fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: defaults::BASE_URL.to_string(),
            text_model: defaults::TEXT_MODEL.to_string(),
            image_model: defaults::IMAGE_MODEL.to_string(),
            imagen_model: defaults::IMAGEN_MODEL.to_string(),
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
        }
    }
}
