//! Gemini generation service
//!
//! Implements `GenerationService` over the Gemini REST API. Text-to-image
//! uses the Imagen `:predict` endpoint; every other operation is a
//! `generateContent` call with inline image parts.

use async_trait::async_trait;
use fusion_engine::{
    GenerationService, ImageData, NodeOutput, SceneObject, SceneSettings, ServiceResult,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::GeminiConfig;
use crate::error::{GeminiError, Result};
use crate::prompts;
use crate::wire::{
    api_error_message, parse_string_list, GenerateContentRequest, GenerateContentResponse, Part,
    PredictRequest, PredictResponse,
};

/// Generation service backed by the Gemini API
pub struct GeminiBackend {
    /// HTTP client for API requests
    http_client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    /// Create a backend from explicit configuration
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(GeminiError::MissingApiKey);
        }
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http_client,
            config,
        })
    }

    /// Create a backend configured from the environment
    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, url: &str, body: &B) -> Result<R> {
        let response = self
            .http_client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = api_error_message(status.as_u16(), &body);
            log::warn!("Gemini request failed ({}): {}", status, message);
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<R>().await?)
    }

    async fn generate(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        log::debug!("generateContent on {}", model);
        let url = self.config.model_url(model, "generateContent");
        self.post(&url, &request).await
    }

    /// Text answer from the text model
    async fn generate_text(&self, parts: Vec<Part>) -> Result<String> {
        let response = self
            .generate(&self.config.text_model, GenerateContentRequest::new(parts))
            .await?;
        Ok(response.text().unwrap_or_default())
    }

    /// Image (or explanatory text) from the image model
    async fn generate_image(&self, parts: Vec<Part>) -> Result<NodeOutput> {
        let request = GenerateContentRequest::new(parts).with_image_output();
        self.generate(&self.config.image_model, request)
            .await?
            .into_output()
    }

    /// JSON string list from the text model
    async fn generate_list(
        &self,
        parts: Vec<Part>,
        field: &str,
        description: &str,
    ) -> Result<Vec<String>> {
        let request = GenerateContentRequest::new(parts).with_string_list(field, description);
        let response = self.generate(&self.config.text_model, request).await?;
        Ok(parse_string_list(&response.text().unwrap_or_default(), field))
    }
}

#[async_trait]
impl GenerationService for GeminiBackend {
    async fn text_to_image(&self, prompt: &str) -> ServiceResult<ImageData> {
        if prompt.trim().is_empty() {
            return Err(GeminiError::InvalidRequest(
                "a prompt is required to generate an image".to_string(),
            )
            .into());
        }
        let url = self.config.model_url(&self.config.imagen_model, "predict");
        log::debug!("predict on {}", self.config.imagen_model);
        let response: PredictResponse = self.post(&url, &PredictRequest::single_png(prompt)).await?;
        Ok(response.into_image()?)
    }

    async fn analyze_image(&self, instruction: &str, image: &ImageData) -> ServiceResult<String> {
        Ok(self
            .generate_text(vec![Part::text(instruction), Part::image(image)])
            .await?)
    }

    async fn extract_style(&self, image: &ImageData, intensity: f32) -> ServiceResult<String> {
        if intensity <= 0.0 {
            return Ok(String::new());
        }
        Ok(self
            .generate_text(vec![
                Part::text(prompts::style_extraction(intensity)),
                Part::image(image),
            ])
            .await?)
    }

    async fn enhance_text(&self, source: &str, instruction: &str) -> ServiceResult<String> {
        if source.is_empty() || instruction.is_empty() {
            return Err(GeminiError::InvalidRequest(
                "both the original text and a refinement instruction are required".to_string(),
            )
            .into());
        }
        Ok(self
            .generate_text(vec![Part::text(prompts::enhance(source, instruction))])
            .await?)
    }

    async fn combine_images(&self, prompt: &str, images: &[ImageData]) -> ServiceResult<NodeOutput> {
        let mut parts = Vec::with_capacity(images.len() + 1);
        if !prompt.trim().is_empty() {
            parts.push(Part::text(prompt));
        }
        parts.extend(images.iter().map(Part::image));
        Ok(self.generate_image(parts).await?)
    }

    async fn refine_image(
        &self,
        instruction: &str,
        image: &ImageData,
        mask: &ImageData,
    ) -> ServiceResult<NodeOutput> {
        Ok(self
            .generate_image(vec![
                Part::text(prompts::masked_refine(instruction)),
                Part::image(image),
                Part::image(mask),
            ])
            .await?)
    }

    async fn render_scene(
        &self,
        settings: &SceneSettings,
        objects: &[SceneObject],
    ) -> ServiceResult<NodeOutput> {
        let mut parts = vec![Part::text(prompts::scene(settings, objects))];
        parts.extend(objects.iter().map(|o| Part::image(&o.image)));
        Ok(self.generate_image(parts).await?)
    }

    async fn suggest_prompts(&self, images: &[ImageData], context: &str) -> ServiceResult<Vec<String>> {
        let mut parts = vec![Part::text(prompts::suggest_prompts(context))];
        parts.extend(images.iter().map(Part::image));
        Ok(self
            .generate_list(parts, "prompts", "A creative instruction for image generation.")
            .await?)
    }

    async fn suggest_text_variations(&self, text: &str) -> ServiceResult<Vec<String>> {
        Ok(self
            .generate_list(
                vec![Part::text(prompts::text_variations(text))],
                "variations",
                "A creative variation of the original text.",
            )
            .await?)
    }
}
