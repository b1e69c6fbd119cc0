//! Request and response shapes of the Gemini REST API

use fusion_engine::{ImageData, NodeOutput};
use serde::{Deserialize, Serialize};

use crate::error::{GeminiError, Result};

// ─── generateContent ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// One part of a content message: text or an inline image
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn image(image: &ImageData) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: image.mime_type.clone(),
                data: image.data.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    /// Single-turn request from parts
    pub fn new(parts: Vec<Part>) -> Self {
        Self {
            contents: vec![Content { parts }],
            generation_config: None,
        }
    }

    /// Ask for image output (text allowed as a fallback)
    pub fn with_image_output(mut self) -> Self {
        self.generation_config = Some(GenerationConfig {
            response_modalities: Some(vec!["IMAGE".to_string(), "TEXT".to_string()]),
            ..GenerationConfig::default()
        });
        self
    }

    /// Ask for a JSON object holding one string array under `field`
    pub fn with_string_list(mut self, field: &str, description: &str) -> Self {
        let schema = serde_json::json!({
            "type": "OBJECT",
            "properties": {
                field: {
                    "type": "ARRAY",
                    "items": { "type": "STRING", "description": description }
                }
            }
        });
        self.generation_config = Some(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(schema),
            ..GenerationConfig::default()
        });
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    fn parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    /// Concatenated text parts of the first candidate
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }

    /// First inline image, else the text, else `NoImage`
    pub fn into_output(self) -> Result<NodeOutput> {
        if let Some(inline) = self.parts().iter().find_map(|p| p.inline_data.as_ref()) {
            return Ok(NodeOutput::image(ImageData::new(
                inline.mime_type.clone(),
                inline.data.clone(),
            )));
        }
        self.text().map(NodeOutput::text).ok_or(GeminiError::NoImage)
    }
}

/// Parse a JSON string-list answer
///
/// Accepts `{ "<field>": [..] }` and, as a fallback, a bare array. Anything
/// else yields an empty list.
pub fn parse_string_list(text: &str, field: &str) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text.trim()) else {
        log::warn!("Could not parse suggestion list: {}", text);
        return Vec::new();
    };
    let array = match &value {
        serde_json::Value::Object(map) => map.get(field).and_then(|v| v.as_array()),
        serde_json::Value::Array(items) => Some(items),
        _ => None,
    };
    array
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

// ─── predict (Imagen) ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct PredictInstance {
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictParameters {
    pub sample_count: u32,
    pub output_mime_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest {
    pub instances: Vec<PredictInstance>,
    pub parameters: PredictParameters,
}

impl PredictRequest {
    /// One PNG image for a prompt
    pub fn single_png(prompt: &str) -> Self {
        Self {
            instances: vec![PredictInstance {
                prompt: prompt.to_string(),
            }],
            parameters: PredictParameters {
                sample_count: 1,
                output_mime_type: "image/png".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    #[serde(default)]
    pub bytes_base64_encoded: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

impl PredictResponse {
    pub fn into_image(self) -> Result<ImageData> {
        self.predictions
            .into_iter()
            .find_map(|p| {
                let data = p.bytes_base64_encoded?;
                let mime = p.mime_type.unwrap_or_else(|| "image/png".to_string());
                Some(ImageData::new(mime, data))
            })
            .ok_or_else(|| GeminiError::InvalidResponse("image generation returned no image".to_string()))
    }
}

// ─── errors ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: String,
}

/// Human-readable message from an error response body
pub fn api_error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("request failed with status {}", status))
}
