//! Prompt compositor for combine nodes
//!
//! Folds every input of a combine node into a single directive plus an
//! ordered list of images. Image inputs are classified by their configured
//! blend mode, text inputs by the kind of node that produced them. The result
//! is a pure function of the graph, so identical graphs give byte-identical
//! directives.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::Graph;
use crate::types::{BlendMode, ImageData, NodeKind, PortId};

const HEADER: &str =
    "**Instructions for the image generation AI - follow this structure STRICTLY:**";

const COMPOSITION_TITLE: &str = "**1. SCENE COMPOSITION (WHAT):** Create a single scene \
containing the following elements, in the order listed, to determine their spatial \
relationship (e.g. the first is the base, the following ones sit on top of or beside it):";

const SUBJECTS_TITLE: &str =
    "**1. MAIN SUBJECT(S) (WHAT):** The central focus of the image is the following concepts:";
const SUBJECTS_TITLE_AFTER_COMPOSITION: &str = "Additional Elements for Conceptual Fusion:";

const TEXT_SUBJECTS_TITLE: &str =
    "**1. MAIN SUBJECT(S) (WHAT):** The central focus of the image is the following:";
const TEXT_SUBJECTS_TITLE_AFTER_SUBJECTS: &str = "Additional Subject Instructions:";

const FALLBACK_WITH_IMAGES: &str = "**1. SUBJECT (WHAT):** Use your creativity to determine \
the subject based on the images and style provided.";
const FALLBACK_WITHOUT_IMAGES: &str =
    "**1. SUBJECT (WHAT):** Use the user's instructions to create the subject.";

const STYLE_TITLE: &str = "**2. STYLE DIRECTIVE (HOW):** Render the subject(s) above strictly \
following these style rules. These are rendering directives, NOT content:";

const INSTRUCTION_TITLE: &str =
    "**3. ADDITIONAL INSTRUCTIONS:** Incorporate this instruction into the overall composition:";

const NEGATIVE_TITLE: &str = "**4. RESTRICTIONS (WHAT NOT TO DO):** ACTIVELY AVOID the \
following elements during generation:";

/// The assembled directive of a combine node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositePrompt {
    /// Directive text handed to the generation service
    pub text: String,
    /// Images in configuration order
    pub images: Vec<ImageData>,
}

/// Describe an influence weight in words, with its rounded percentage
///
/// Bands are inclusive at their upper bound.
pub fn influence_descriptor(weight: f32) -> String {
    let percent = (weight * 100.0).round() as i64;
    let phrase = match percent {
        p if p <= 15 => "a very subtle, barely perceptible influence",
        p if p <= 35 => "a minor and subtle influence",
        p if p <= 65 => "a balanced and significant fusion",
        p if p <= 85 => "a strong and defining influence",
        _ => "a dominant and overriding influence that dictates the final result",
    };
    format!("{} ({}%)", phrase, percent)
}

#[derive(Default)]
struct Sections {
    composition: Vec<String>,
    subjects: Vec<String>,
    text_subjects: Vec<String>,
    styles: Vec<String>,
    negatives: Vec<String>,
    images: Vec<ImageData>,
}

/// Build the composite directive for a combine node
pub fn compose(graph: &Graph, node_id: &str) -> Result<CompositePrompt> {
    let node = graph.node(node_id)?;
    let mut sections = Sections::default();

    for config in node.combine_inputs() {
        let Some(edge) = graph.find_edge(&config.edge_id) else {
            continue;
        };
        if edge.target != node.id || !matches!(edge.target_port, PortId::Slot(_)) {
            continue;
        }
        let Some(source) = graph.find_node(&edge.source) else {
            continue;
        };
        let Some(image) = source.image() else {
            continue;
        };

        let influence = influence_descriptor(config.influence);
        let label = &source.label;
        match config.blend_mode {
            BlendMode::AdditiveConcept | BlendMode::Passthrough => sections.subjects.push(format!(
                "- The concept of \"{}\" (with influence {}).",
                label, influence
            )),
            BlendMode::SceneCompositionElement => sections.composition.push(format!(
                "- The object from \"{}\" (with influence {}).",
                label, influence
            )),
            BlendMode::StyleReference => sections.styles.push(format!(
                "- The aesthetics of the reference image \"{}\" (with influence {}). Do NOT copy \
                 its objects, only its color palette, lighting, texture and composition.",
                label, influence
            )),
            BlendMode::NegativeGuide => sections.negatives.push(format!(
                "- ACTIVELY AVOID the elements, colors or style of the reference image \"{}\" \
                 (with influence {}).",
                label, influence
            )),
        }
        sections.images.push(image.clone());
    }

    for edge in graph
        .incoming_edges(&node.id)
        .filter(|e| matches!(e.target_port, PortId::Prompt | PortId::Text))
    {
        let Some(source) = graph.find_node(&edge.source) else {
            continue;
        };
        let Some(text) = source.text() else {
            continue;
        };
        match source.kind() {
            NodeKind::TextSource | NodeKind::EnhanceText => {
                sections.text_subjects.push(text.to_string())
            }
            _ => sections.styles.push(format!("- {}", text)),
        }
    }

    let text = assemble(&sections, node.instruction());
    log::debug!(
        "Composed directive for '{}' from {} image(s)",
        node_id,
        sections.images.len()
    );

    Ok(CompositePrompt {
        text,
        images: sections.images,
    })
}

fn assemble(sections: &Sections, instruction: Option<&str>) -> String {
    let mut parts = vec![HEADER.to_string()];

    let mut subject = String::new();
    if !sections.composition.is_empty() {
        subject.push_str(&format!(
            "\n{}\n{}",
            COMPOSITION_TITLE,
            sections.composition.join("\n")
        ));
    }
    if !sections.subjects.is_empty() {
        let title = if sections.composition.is_empty() {
            SUBJECTS_TITLE
        } else {
            SUBJECTS_TITLE_AFTER_COMPOSITION
        };
        subject.push_str(&format!("\n{}\n{}", title, sections.subjects.join("\n")));
    }
    if !sections.text_subjects.is_empty() {
        let title = if sections.composition.is_empty() && sections.subjects.is_empty() {
            TEXT_SUBJECTS_TITLE
        } else {
            TEXT_SUBJECTS_TITLE_AFTER_SUBJECTS
        };
        subject.push_str(&format!(
            "\n{}\n{}",
            title,
            sections.text_subjects.join("\n\n")
        ));
    }

    if !subject.is_empty() {
        parts.push(subject);
    } else if !sections.images.is_empty() {
        parts.push(format!("\n{}", FALLBACK_WITH_IMAGES));
    } else {
        parts.push(format!("\n{}", FALLBACK_WITHOUT_IMAGES));
    }

    if !sections.styles.is_empty() {
        parts.push(format!("\n{}\n{}", STYLE_TITLE, sections.styles.join("\n")));
    }

    if let Some(instruction) = instruction {
        parts.push(format!("\n{} \"{}\"", INSTRUCTION_TITLE, instruction));
    }

    if !sections.negatives.is_empty() {
        parts.push(format!(
            "\n{}\n{}",
            NEGATIVE_TITLE,
            sections.negatives.join("\n")
        ));
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Node, NodeOutput};

    fn image(data: &str) -> ImageData {
        ImageData::new("image/png", data)
    }

    #[test]
    fn test_influence_bands() {
        assert_eq!(
            influence_descriptor(0.15),
            "a very subtle, barely perceptible influence (15%)"
        );
        assert_eq!(influence_descriptor(0.16), "a minor and subtle influence (16%)");
        assert_eq!(influence_descriptor(0.35), "a minor and subtle influence (35%)");
        assert_eq!(
            influence_descriptor(0.6),
            "a balanced and significant fusion (60%)"
        );
        assert_eq!(influence_descriptor(0.85), "a strong and defining influence (85%)");
        assert_eq!(
            influence_descriptor(1.0),
            "a dominant and overriding influence that dictates the final result (100%)"
        );
        assert_eq!(
            influence_descriptor(0.0),
            "a very subtle, barely perceptible influence (0%)"
        );
    }

    #[test]
    fn test_empty_combine_uses_instruction_fallback() {
        let mut graph = Graph::new();
        graph
            .add_node(Node::new("c", NodeKind::Combine).instructed("  a castle at dusk "))
            .unwrap();

        let prompt = compose(&graph, "c").unwrap();
        assert!(prompt.images.is_empty());
        assert_eq!(
            prompt.text,
            format!(
                "{}\n\n{}\n\n{} \"a castle at dusk\"",
                HEADER, FALLBACK_WITHOUT_IMAGES, INSTRUCTION_TITLE
            )
        );
    }

    #[test]
    fn test_blend_modes_are_sectioned() {
        let mut graph = Graph::new();
        graph
            .add_node(Node::raw_image("base", image("base")).labeled("Table"))
            .unwrap();
        graph
            .add_node(Node::raw_image("vase", image("vase")).labeled("Vase"))
            .unwrap();
        graph
            .add_node(Node::raw_image("style", image("style")).labeled("Monet"))
            .unwrap();
        graph
            .add_node(Node::raw_image("avoid", image("avoid")).labeled("Neon"))
            .unwrap();
        graph.add_node(Node::new("c", NodeKind::Combine)).unwrap();

        let e_base = graph.add_edge("base", PortId::IMAGE, "c", PortId::Slot(0)).unwrap();
        let e_vase = graph.add_edge("vase", PortId::IMAGE, "c", PortId::Slot(1)).unwrap();
        let e_style = graph.add_edge("style", PortId::IMAGE, "c", PortId::Slot(2)).unwrap();
        let e_avoid = graph.add_edge("avoid", PortId::IMAGE, "c", PortId::Slot(3)).unwrap();

        graph
            .set_combine_input("c", &e_base, 1.0, BlendMode::SceneCompositionElement)
            .unwrap();
        graph
            .set_combine_input("c", &e_vase, 0.3, BlendMode::AdditiveConcept)
            .unwrap();
        graph
            .set_combine_input("c", &e_style, 0.5, BlendMode::StyleReference)
            .unwrap();
        graph
            .set_combine_input("c", &e_avoid, 0.9, BlendMode::NegativeGuide)
            .unwrap();

        let prompt = compose(&graph, "c").unwrap();
        let text = &prompt.text;

        assert_eq!(prompt.images.len(), 4);
        assert_eq!(prompt.images[0], image("base"));
        assert!(text.contains(COMPOSITION_TITLE));
        assert!(text.contains(SUBJECTS_TITLE_AFTER_COMPOSITION));
        assert!(!text.contains(SUBJECTS_TITLE));
        assert!(text.contains("- The object from \"Table\""));
        assert!(text.contains("- The concept of \"Vase\" (with influence a minor and subtle influence (30%))."));
        assert!(text.contains("reference image \"Monet\""));
        assert!(text.contains("ACTIVELY AVOID the elements, colors or style of the reference image \"Neon\""));

        let composition = text.find(COMPOSITION_TITLE).unwrap();
        let style = text.find(STYLE_TITLE).unwrap();
        let negative = text.find(NEGATIVE_TITLE).unwrap();
        assert!(composition < style && style < negative);
        assert!(!text.contains(INSTRUCTION_TITLE));
    }

    #[test]
    fn test_text_inputs_are_classified_by_source_kind() {
        let mut graph = Graph::new();
        graph
            .add_node(Node::new("style", NodeKind::StyleExtractor).with_output(NodeOutput::text("oil paint")))
            .unwrap();
        graph.add_node(Node::text_source("t", "a red cube")).unwrap();
        graph.add_node(Node::new("c", NodeKind::Combine)).unwrap();
        graph.add_node(Node::new("c2", NodeKind::Combine)).unwrap();
        graph.add_edge("style", PortId::Text, "c", PortId::Prompt).unwrap();
        graph.add_edge("t", PortId::Text, "c2", PortId::Prompt).unwrap();

        let styled = compose(&graph, "c").unwrap();
        assert!(styled.text.contains(&format!("{}\n- oil paint", STYLE_TITLE)));
        assert!(styled.text.contains(FALLBACK_WITHOUT_IMAGES));

        let subject = compose(&graph, "c2").unwrap();
        assert!(subject
            .text
            .contains(&format!("{}\na red cube", TEXT_SUBJECTS_TITLE)));
    }

    #[test]
    fn test_sources_without_images_are_skipped() {
        let mut graph = Graph::new();
        graph.add_node(Node::new("refine", NodeKind::DetailRefine)).unwrap();
        graph.add_node(Node::new("c", NodeKind::Combine)).unwrap();
        graph.add_edge("refine", PortId::IMAGE, "c", PortId::Slot(0)).unwrap();

        let prompt = compose(&graph, "c").unwrap();
        assert!(prompt.images.is_empty());
        assert!(prompt.text.contains(FALLBACK_WITHOUT_IMAGES));
    }

    #[test]
    fn test_configuration_order_wins_over_edge_order() {
        let mut graph = Graph::new();
        graph.add_node(Node::raw_image("p", image("p")).labeled("P")).unwrap();
        graph.add_node(Node::raw_image("q", image("q")).labeled("Q")).unwrap();
        graph.add_node(Node::new("c", NodeKind::Combine)).unwrap();
        let e_p = graph.add_edge("p", PortId::IMAGE, "c", PortId::Slot(0)).unwrap();
        let e_q = graph.add_edge("q", PortId::IMAGE, "c", PortId::Slot(1)).unwrap();
        for edge in [&e_p, &e_q] {
            graph
                .set_combine_input("c", edge, 0.5, BlendMode::SceneCompositionElement)
                .unwrap();
        }

        graph.reorder_combine_inputs("c", &[e_q, e_p]).unwrap();
        let prompt = compose(&graph, "c").unwrap();

        assert_eq!(prompt.images, vec![image("q"), image("p")]);
        let q = prompt.text.find("- The object from \"Q\"").unwrap();
        let p = prompt.text.find("- The object from \"P\"").unwrap();
        assert!(q < p);
    }

    #[test]
    fn test_style_and_negative_images_use_image_fallback() {
        let mut graph = Graph::new();
        graph.add_node(Node::raw_image("s", image("s")).labeled("Style")).unwrap();
        graph.add_node(Node::raw_image("n", image("n")).labeled("Avoid")).unwrap();
        graph.add_node(Node::new("c", NodeKind::Combine)).unwrap();
        let e_s = graph.add_edge("s", PortId::IMAGE, "c", PortId::Slot(0)).unwrap();
        let e_n = graph.add_edge("n", PortId::IMAGE, "c", PortId::Slot(1)).unwrap();
        graph
            .set_combine_input("c", &e_s, 0.7, BlendMode::StyleReference)
            .unwrap();
        graph
            .set_combine_input("c", &e_n, 0.2, BlendMode::NegativeGuide)
            .unwrap();

        let prompt = compose(&graph, "c").unwrap();
        assert_eq!(prompt.images.len(), 2);
        assert!(prompt.text.contains(FALLBACK_WITH_IMAGES));
        assert!(!prompt.text.contains(FALLBACK_WITHOUT_IMAGES));
        assert!(!prompt.text.contains(SUBJECTS_TITLE));
    }

    #[test]
    fn test_passthrough_is_a_subject() {
        let mut graph = Graph::new();
        graph.add_node(Node::raw_image("a", image("a")).labeled("Boat")).unwrap();
        graph.add_node(Node::new("c", NodeKind::Combine)).unwrap();
        let edge = graph.add_edge("a", PortId::IMAGE, "c", PortId::Slot(0)).unwrap();
        graph
            .set_combine_input("c", &edge, 0.1, BlendMode::Passthrough)
            .unwrap();

        let text = compose(&graph, "c").unwrap().text;
        assert!(text.contains(&format!(
            "{}\n- The concept of \"Boat\" (with influence a very subtle, barely perceptible influence (10%)).",
            SUBJECTS_TITLE
        )));
        assert!(!text.contains(STYLE_TITLE));
        assert!(!text.contains(NEGATIVE_TITLE));
    }

    #[test]
    fn test_text_subjects_follow_image_subjects() {
        let mut graph = Graph::new();
        graph.add_node(Node::raw_image("a", image("a")).labeled("Boat")).unwrap();
        graph.add_node(Node::text_source("t", "at sunset")).unwrap();
        graph.add_node(Node::new("c", NodeKind::Combine)).unwrap();
        graph.add_edge("a", PortId::IMAGE, "c", PortId::Slot(0)).unwrap();
        graph.add_edge("t", PortId::Text, "c", PortId::Prompt).unwrap();

        let text = compose(&graph, "c").unwrap().text;
        assert!(text.contains(SUBJECTS_TITLE));
        assert!(!text.contains(TEXT_SUBJECTS_TITLE));
        let subjects = text.find(SUBJECTS_TITLE).unwrap();
        let extra = text
            .find(&format!("{}\nat sunset", TEXT_SUBJECTS_TITLE_AFTER_SUBJECTS))
            .unwrap();
        assert!(subjects < extra);
    }

    #[test]
    fn test_compose_is_deterministic() {
        let mut graph = Graph::new();
        graph.add_node(Node::raw_image("a", image("a"))).unwrap();
        graph.add_node(Node::text_source("t", "x")).unwrap();
        graph.add_node(Node::new("c", NodeKind::Combine).instructed("y")).unwrap();
        graph.add_edge("a", PortId::IMAGE, "c", PortId::Slot(0)).unwrap();
        graph.add_edge("t", PortId::Text, "c", PortId::Prompt).unwrap();

        assert_eq!(compose(&graph, "c").unwrap(), compose(&graph, "c").unwrap());
    }
}
