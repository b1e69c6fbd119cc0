//! Scripted generation service for tests
//!
//! `MockGenerationService` answers every operation with a deterministic value
//! derived from its inputs and records each call, so tests can assert on
//! exactly which operations a run performed and with what arguments.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::service::{GenerationService, ServiceResult};
use crate::types::{ImageData, NodeOutput, SceneObject, SceneSettings};

/// One recorded service call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Operation name, e.g. `"combine_images"`
    pub operation: &'static str,
    /// Main text argument (prompt, instruction or source text)
    pub text: String,
    /// Image arguments in call order
    pub images: Vec<ImageData>,
}

#[derive(Default)]
struct MockState {
    calls: Vec<RecordedCall>,
    failures: HashMap<&'static str, String>,
}

/// A generation service with scripted, deterministic answers
#[derive(Default)]
pub struct MockGenerationService {
    state: Mutex<MockState>,
}

impl MockGenerationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `operation` fail with `message`
    pub fn fail_on(&self, operation: &'static str, message: impl Into<String>) {
        self.lock().failures.insert(operation, message.into());
    }

    /// Let `operation` succeed again
    pub fn succeed_on(&self, operation: &'static str) {
        self.lock().failures.remove(operation);
    }

    /// All calls so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Operation names of all calls so far, in order
    pub fn operations(&self) -> Vec<&'static str> {
        self.lock().calls.iter().map(|c| c.operation).collect()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(
        &self,
        operation: &'static str,
        text: &str,
        images: &[&ImageData],
    ) -> ServiceResult<()> {
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            operation,
            text: text.to_string(),
            images: images.iter().map(|i| (*i).clone()).collect(),
        });
        match state.failures.get(operation) {
            Some(message) => Err(ServiceError::new(message.clone())),
            None => Ok(()),
        }
    }
}

fn png(data: String) -> ImageData {
    ImageData::new("image/png", data)
}

#[async_trait]
impl GenerationService for MockGenerationService {
    async fn text_to_image(&self, prompt: &str) -> ServiceResult<ImageData> {
        self.record("text_to_image", prompt, &[])?;
        Ok(png(format!("rendered:{}", prompt)))
    }

    async fn analyze_image(&self, instruction: &str, image: &ImageData) -> ServiceResult<String> {
        self.record("analyze_image", instruction, &[image])?;
        Ok(format!("analysis of {}", image.data))
    }

    async fn extract_style(&self, image: &ImageData, intensity: f32) -> ServiceResult<String> {
        self.record("extract_style", &intensity.to_string(), &[image])?;
        Ok(format!("style of {}", image.data))
    }

    async fn enhance_text(&self, source: &str, instruction: &str) -> ServiceResult<String> {
        self.record("enhance_text", source, &[])?;
        Ok(format!("{} ({})", source, instruction))
    }

    async fn combine_images(&self, prompt: &str, images: &[ImageData]) -> ServiceResult<NodeOutput> {
        let refs: Vec<&ImageData> = images.iter().collect();
        self.record("combine_images", prompt, &refs)?;
        Ok(NodeOutput::image(png(format!("combined:{}", images.len()))))
    }

    async fn refine_image(
        &self,
        instruction: &str,
        image: &ImageData,
        mask: &ImageData,
    ) -> ServiceResult<NodeOutput> {
        self.record("refine_image", instruction, &[image, mask])?;
        Ok(NodeOutput::image(png(format!("refined:{}", image.data))))
    }

    async fn render_scene(
        &self,
        settings: &SceneSettings,
        objects: &[SceneObject],
    ) -> ServiceResult<NodeOutput> {
        let refs: Vec<&ImageData> = objects.iter().map(|o| &o.image).collect();
        self.record("render_scene", settings.render_style.as_str(), &refs)?;
        Ok(NodeOutput::image(png(format!("scene:{}", objects.len()))))
    }

    async fn suggest_prompts(&self, images: &[ImageData], context: &str) -> ServiceResult<Vec<String>> {
        let refs: Vec<&ImageData> = images.iter().collect();
        self.record("suggest_prompts", context, &refs)?;
        Ok((1..=3)
            .map(|i| format!("suggestion {} for {} image(s)", i, images.len()))
            .collect())
    }

    async fn suggest_text_variations(&self, text: &str) -> ServiceResult<Vec<String>> {
        self.record("suggest_text_variations", text, &[])?;
        Ok((1..=3).map(|i| format!("{}, variation {}", text, i)).collect())
    }
}
