//! The generation service boundary
//!
//! Every model call the engine makes goes through `GenerationService`. The
//! engine never talks to a network or a model directly, so hosts can plug in
//! a remote API, a local model, or a scripted mock for tests.

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::types::{ImageData, NodeOutput, SceneObject, SceneSettings};

/// Result of a generation service call
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// The operations a generation backend must provide.
///
/// Implementations surface failures as a `ServiceError` whose message is
/// shown verbatim on the failing node. Timeouts and retries, if any, are the
/// implementation's concern.
#[async_trait]
pub trait GenerationService: Send + Sync {
    // ─── GENERATION ─────────────────────────────────────────────────

    /// Render an image from a text prompt
    async fn text_to_image(&self, prompt: &str) -> ServiceResult<ImageData>;

    /// Describe an image following an instruction
    async fn analyze_image(&self, instruction: &str, image: &ImageData) -> ServiceResult<String>;

    /// Produce a subject-agnostic style directive for an image
    ///
    /// `intensity` is in (0, 1]; the engine handles 0 itself.
    async fn extract_style(&self, image: &ImageData, intensity: f32) -> ServiceResult<String>;

    /// Rewrite a text following an instruction
    async fn enhance_text(&self, source: &str, instruction: &str) -> ServiceResult<String>;

    /// Generate from a composite directive and an ordered image list
    async fn combine_images(&self, prompt: &str, images: &[ImageData]) -> ServiceResult<NodeOutput>;

    /// Edit the non-black areas of `mask` on `image`
    async fn refine_image(
        &self,
        instruction: &str,
        image: &ImageData,
        mask: &ImageData,
    ) -> ServiceResult<NodeOutput>;

    /// Render object images into one scene
    async fn render_scene(
        &self,
        settings: &SceneSettings,
        objects: &[SceneObject],
    ) -> ServiceResult<NodeOutput>;

    // ─── ASSISTANCE ─────────────────────────────────────────────────

    /// Suggest prompts for a set of images, building on optional context
    async fn suggest_prompts(&self, images: &[ImageData], context: &str) -> ServiceResult<Vec<String>>;

    /// Suggest rewordings of a text
    async fn suggest_text_variations(&self, text: &str) -> ServiceResult<Vec<String>>;
}
