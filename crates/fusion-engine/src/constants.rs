//! Engine-wide constants
//!
//! Single source of truth for defaults and fixed tuning values.

/// Timing values
pub mod timeouts {
    /// How long a node's failure message stays visible
    pub const ERROR_CLEAR_MS: u64 = 5_000;
}

/// Default values for engine configuration
pub mod defaults {
    /// Instruction used by analyze nodes whose instruction is blank
    pub const ANALYZE_INSTRUCTION: &str = "Perform an in-depth visual analysis of the provided \
image. Break your description down into the following six key components, giving detail for \
each one. The goal is a detailed prompt that can be used to recreate or draw inspiration from \
this image.

1.  **SUBJECT:** Describe the main subject(s) in detail (e.g. 'a young woman with freckles', \
'a luxury Swiss watch').
2.  **ACTION:** What is the subject doing? (e.g. 'smiling thoughtfully', 'posed at a \
three-quarter angle').
3.  **ENVIRONMENT:** Where does the scene take place? (e.g. 'in a cozy cafe by the window', \
'in a modern corporate office').
4.  **ART STYLE:** What is the medium and style? (e.g. 'Photograph taken with an 85mm lens', \
'impressionist oil painting', 'photorealistic 3D render').
5.  **LIGHTING:** Describe the lighting conditions. (e.g. 'natural window light', 'studio \
lighting with a softbox', 'golden hour').
6.  **DETAILS:** Mention any other important details or composition elements. (e.g. 'hot cup \
of coffee in hand', 'softly focused background', 'rocks in the foreground').";

    /// Style intensity of a new style extractor
    pub const STYLE_INTENSITY: f32 = 1.0;

    /// Influence of a newly connected combine input
    pub const COMBINE_INFLUENCE: f32 = 1.0;
}
