//! Instruction templates sent to the models

use fusion_engine::{SceneObject, SceneSettings};

/// Subject-agnostic style extraction, modulated by intensity
pub fn style_extraction(intensity: f32) -> String {
    let percent = (intensity * 100.0).round() as i64;
    format!(
        "Your task is to act as an expert art director. Your goal is to write an instruction \
prefix that captures the **stylistic and structural essence** of the provided image while \
being **completely agnostic about its subject**. The instruction must be usable to apply the \
style to an entirely new and unrelated subject.

**Crucial Instructions:**
1.  **Analyze Structure and Composition:** Identify the fundamental layout. Is it a radial \
infographic? A technical blueprint with exploded views? A photographic composition with a \
specific depth of field? Describe this STRUCTURE.
2.  **Analyze the Visual Aesthetic:** Describe the color palette, lighting, texture (e.g. \
engraving, watercolor, film grain), line style and overall mood.
3.  **BE SUBJECT-AGNOSTIC:** This is the most important rule. **Do NOT mention the specific \
objects or living beings** in the reference image. If you see an infographic of insects, \
describe the structure of a \"circular scientific infographic with labeled segments\" and the \
\"vintage engraving\" style, but do NOT mention the \"insects\". If you see a photo of a car, \
describe the \"cinematic style with neon lighting\", not the \"car\".
4.  **Merge into One Cohesive Instruction:** Combine your structural and aesthetic analysis \
into a single, powerful instruction sentence. Your output must be a clear directive to an \
image AI about HOW to create something, not WHAT to create.
5.  **Final Check:** Before answering, review your instruction. If it mentions any specific \
object or subject from the reference image, rewrite it to be purely abstract and stylistic.

**Intensity Modulation ({percent}%):**
*   **100%:** An extremely detailed description of structure and aesthetic, almost a recipe \
for recreating the style.
*   **50%:** Capture the most prominent structural and aesthetic elements.
*   **10%:** Focus on the single most defining aspect, either the structure (\"In a diagram \
layout...\") or the aesthetic (\"With a vintage engraving aesthetic...\").
*   **0%:** The output must be an empty string.

Output ONLY the final instruction sentence. Do not include your analysis steps or any other \
text."
    )
}

/// Rewrite a text for use as an image generation prompt
pub fn enhance(source: &str, instruction: &str) -> String {
    format!(
        "Your task is to refine a text to be used as an instruction for an image generation AI.

Original Text: \"{source}\"

Refinement Instruction: \"{instruction}\"

Following the instruction, rewrite the original text. Output ONLY the final refined text."
    )
}

/// Masked edit of an image
pub fn masked_refine(instruction: &str) -> String {
    format!(
        "Instructions: {instruction}. Edit the original image, applying changes ONLY to the \
non-black areas of the provided mask."
    )
}

/// Scene description; objects are listed in the order their images are attached
pub fn scene(settings: &SceneSettings, objects: &[SceneObject]) -> String {
    let mut parts = vec![
        format!(
            "Generate a single, coherent scene in a \"{}\" art style.",
            settings.render_style.as_str()
        ),
        format!(
            "The camera viewpoint is \"{}\".",
            settings.camera_elevation.as_str()
        ),
    ];

    if objects.is_empty() {
        parts.push(
            "The scene is currently empty. Generate an interesting empty scene based on the \
style and camera angle."
                .to_string(),
        );
    } else {
        parts.push("\nThe scene contains the following objects:".to_string());
        for object in objects {
            parts.push(format!(
                "- A \"{}\" (see provided image). It should be scaled to about {}% of its \
natural size and rotated to face \"{}\".",
                object.label,
                (object.scale * 100.0).round() as i64,
                object.rotation.as_str()
            ));
        }
    }

    parts.join(" ")
}

/// Prompt ideas for a set of images, optionally building on existing context
pub fn suggest_prompts(context: &str) -> String {
    if context.trim().is_empty() {
        "Based on the provided image(s), suggest 3 distinct, creative and detailed \
instructions that could be used to generate a new and interesting image. The instructions \
must be suitable for an image generation AI."
            .to_string()
    } else {
        format!(
            "You are an AI assistant helping to build an instruction for image generation. You \
were given existing context made of style and subject descriptions: \"{context}\".
Based on this context AND the provided image(s), suggest 3 creative instructions that develop, \
refine or complete the idea. The suggestions must be short additions to the existing context, \
not complete replacements."
        )
    }
}

/// Rewordings of an authored text
pub fn text_variations(text: &str) -> String {
    format!(
        "You are a creative writing assistant. Based on the following text, generate 3 \
distinct, improved variations. Each variation should explore a different angle, tone or level \
of detail while keeping the main intent of the original. The variations must be ready to use \
as instructions for an image generation AI.

Original Text: \"{text}\"

Generate the 3 variations."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_engine::{ImageData, ObjectRotation, RenderStyle};

    #[test]
    fn test_style_extraction_embeds_percent() {
        assert!(style_extraction(0.5).contains("**Intensity Modulation (50%):**"));
    }

    #[test]
    fn test_scene_lists_objects() {
        let settings = SceneSettings {
            render_style: RenderStyle::ArchitecturalSketch,
            ..SceneSettings::default()
        };
        let objects = vec![SceneObject {
            label: "Chair".to_string(),
            image: ImageData::new("image/png", "AAAA"),
            scale: 0.5,
            rotation: ObjectRotation::Left,
        }];

        let prompt = scene(&settings, &objects);
        assert!(prompt.starts_with(
            "Generate a single, coherent scene in a \"architectural-sketch\" art style."
        ));
        assert!(prompt.contains("camera viewpoint is \"eye-level\""));
        assert!(prompt.contains("- A \"Chair\" (see provided image). It should be scaled to about 50%"));
        assert!(prompt.contains("face \"left\""));

        assert!(scene(&settings, &[]).contains("The scene is currently empty."));
    }

    #[test]
    fn test_suggest_prompts_context() {
        assert!(!suggest_prompts("  ").contains("existing context"));
        assert!(suggest_prompts("a castle").contains("\"a castle\""));
    }
}
