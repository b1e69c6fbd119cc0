//! Per-kind execution behavior
//!
//! Every table that depends on the node kind lives here as an exhaustive
//! `match`, so adding a kind fails to compile until each behavior is decided.
//! Dispatch is split in two: `prepare` reads the graph and checks
//! preconditions synchronously, `invoke` awaits the generation service with
//! owned arguments. The graph is never borrowed across the await.

use crate::compositor;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::graph::Graph;
use crate::service::GenerationService;
use crate::types::{
    ImageData, Node, NodeId, NodeKind, NodeOutput, NodePayload, PortId, SceneObject, SceneSettings,
};

/// Whether a node's cached output is usable by downstream nodes
///
/// Raw images never execute, so they never hold a valid output.
pub fn has_valid_output(node: &Node) -> bool {
    let Some(output) = &node.output else {
        return false;
    };
    match node.kind() {
        NodeKind::Analyze | NodeKind::StyleExtractor | NodeKind::EnhanceText => output.has_text(),
        NodeKind::TextSource
        | NodeKind::Combine
        | NodeKind::SceneCompose
        | NodeKind::DetailRefine => output.has_image(),
        NodeKind::RawImage => false,
    }
}

/// Whether a kind performs a generation call when run
pub fn is_computing(kind: NodeKind) -> bool {
    match kind {
        NodeKind::RawImage => false,
        NodeKind::TextSource
        | NodeKind::Analyze
        | NodeKind::StyleExtractor
        | NodeKind::EnhanceText
        | NodeKind::Combine
        | NodeKind::SceneCompose
        | NodeKind::DetailRefine => true,
    }
}

/// Whether the previous output stays visible while the node runs
pub fn keeps_output_while_running(kind: NodeKind) -> bool {
    match kind {
        NodeKind::Combine | NodeKind::SceneCompose | NodeKind::TextSource | NodeKind::Analyze => {
            true
        }
        NodeKind::RawImage
        | NodeKind::StyleExtractor
        | NodeKind::EnhanceText
        | NodeKind::DetailRefine => false,
    }
}

/// A fully resolved generation request
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
    TextToImage {
        prompt: String,
    },
    /// The input image is echoed back in the output
    Analyze {
        instruction: String,
        image: ImageData,
    },
    ExtractStyle {
        image: ImageData,
        intensity: f32,
    },
    Enhance {
        source: String,
        instruction: String,
    },
    Combine {
        prompt: String,
        images: Vec<ImageData>,
    },
    Refine {
        instruction: String,
        image: ImageData,
        mask: ImageData,
    },
    RenderScene {
        settings: SceneSettings,
        objects: Vec<SceneObject>,
    },
    /// Result known without calling the service
    Immediate(NodeOutput),
}

impl ServiceCall {
    /// Operation name, for logs
    pub fn operation(&self) -> &'static str {
        match self {
            Self::TextToImage { .. } => "text_to_image",
            Self::Analyze { .. } => "analyze_image",
            Self::ExtractStyle { .. } => "extract_style",
            Self::Enhance { .. } => "enhance_text",
            Self::Combine { .. } => "combine_images",
            Self::Refine { .. } => "refine_image",
            Self::RenderScene { .. } => "render_scene",
            Self::Immediate(_) => "immediate",
        }
    }
}

// ---------------------------------------------------------------------------
// Input resolution
// ---------------------------------------------------------------------------

/// The image arriving on a node's primary image slot
fn input_image(graph: &Graph, node_id: &str) -> Result<ImageData> {
    let edge = graph
        .edge_into(node_id, PortId::IMAGE)
        .ok_or_else(|| EngineError::missing("input image not connected"))?;
    graph
        .find_node(&edge.source)
        .and_then(Node::image)
        .filter(|image| !image.is_empty())
        .cloned()
        .ok_or_else(|| EngineError::missing("input node has no image data"))
}

/// The text arriving on a node's `text` port
fn input_text(graph: &Graph, node_id: &str) -> Result<String> {
    let edge = graph
        .edge_into(node_id, PortId::Text)
        .ok_or_else(|| EngineError::missing("text input not connected"))?;
    graph
        .find_node(&edge.source)
        .and_then(Node::text)
        .map(str::to_string)
        .ok_or_else(|| EngineError::missing("input node has no text"))
}

/// Distinct nodes feeding a node's image slots, in edge order
pub(crate) fn image_sources(graph: &Graph, node_id: &str) -> Vec<NodeId> {
    let mut sources: Vec<NodeId> = Vec::new();
    for edge in graph
        .incoming_edges(node_id)
        .filter(|e| matches!(e.target_port, PortId::Slot(_)))
    {
        if !sources.contains(&edge.source) {
            sources.push(edge.source.clone());
        }
    }
    sources
}

fn scene_objects(graph: &Graph, settings: &SceneSettings) -> Vec<SceneObject> {
    settings
        .objects
        .iter()
        .filter_map(|placement| {
            let node = graph.find_node(&placement.node_id)?;
            let image = node.image()?;
            Some(SceneObject {
                label: node.label.clone(),
                image: image.clone(),
                scale: placement.scale,
                rotation: placement.rotation,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Resolve a node's inputs and check its preconditions
pub fn prepare(graph: &Graph, node_id: &str, config: &EngineConfig) -> Result<ServiceCall> {
    let node = graph.node(node_id)?;

    match &node.payload {
        NodePayload::RawImage(_) => Err(EngineError::NotExecutable(NodeKind::RawImage)),

        NodePayload::TextSource(payload) => {
            if payload.text.trim().is_empty() {
                return Err(EngineError::invalid_config(
                    "text node has no content to generate an image from",
                ));
            }
            Ok(ServiceCall::TextToImage {
                prompt: payload.text.clone(),
            })
        }

        NodePayload::Analyze => {
            let image = input_image(graph, node_id)?;
            let instruction = node
                .instruction()
                .map(str::to_string)
                .unwrap_or_else(|| config.default_analyze_instruction.clone());
            Ok(ServiceCall::Analyze { instruction, image })
        }

        NodePayload::StyleExtractor(payload) => {
            let image = input_image(graph, node_id)?;
            if payload.intensity <= 0.0 {
                return Ok(ServiceCall::Immediate(NodeOutput::text("")));
            }
            Ok(ServiceCall::ExtractStyle {
                image,
                intensity: payload.intensity,
            })
        }

        NodePayload::EnhanceText => {
            let source = input_text(graph, node_id)?;
            let instruction = node
                .instruction()
                .ok_or_else(|| EngineError::invalid_config("provide a refinement instruction"))?;
            Ok(ServiceCall::Enhance {
                source,
                instruction: instruction.to_string(),
            })
        }

        NodePayload::Combine(_) => {
            let composite = compositor::compose(graph, node_id)?;
            if composite.images.is_empty() && node.instruction().is_none() {
                return Err(EngineError::invalid_config(
                    "connect an image or add an instruction",
                ));
            }
            Ok(ServiceCall::Combine {
                prompt: composite.text,
                images: composite.images,
            })
        }

        NodePayload::DetailRefine(payload) => {
            let image = input_image(graph, node_id)?;
            let instruction = node
                .instruction()
                .ok_or_else(|| EngineError::invalid_config("add a refinement instruction"))?
                .to_string();
            match payload.mask.as_ref().filter(|mask| !mask.is_empty()) {
                Some(mask) => Ok(ServiceCall::Refine {
                    instruction,
                    image,
                    mask: mask.clone(),
                }),
                None => Ok(ServiceCall::Combine {
                    prompt: instruction,
                    images: vec![image],
                }),
            }
        }

        NodePayload::SceneCompose(payload) => {
            let settings = payload.settings.reconciled(&image_sources(graph, node_id));
            let objects = scene_objects(graph, &settings);
            Ok(ServiceCall::RenderScene { settings, objects })
        }
    }
}

/// Perform a prepared call and shape its result as a node output
pub async fn invoke(call: ServiceCall, service: &dyn GenerationService) -> Result<NodeOutput> {
    let output = match call {
        ServiceCall::TextToImage { prompt } => NodeOutput::image(service.text_to_image(&prompt).await?),
        ServiceCall::Analyze { instruction, image } => {
            let text = service.analyze_image(&instruction, &image).await?;
            NodeOutput {
                text: Some(text),
                image: Some(image),
            }
        }
        ServiceCall::ExtractStyle { image, intensity } => {
            NodeOutput::text(service.extract_style(&image, intensity).await?)
        }
        ServiceCall::Enhance {
            source,
            instruction,
        } => NodeOutput::text(service.enhance_text(&source, &instruction).await?),
        ServiceCall::Combine { prompt, images } => service.combine_images(&prompt, &images).await?,
        ServiceCall::Refine {
            instruction,
            image,
            mask,
        } => service.refine_image(&instruction, &image, &mask).await?,
        ServiceCall::RenderScene { settings, objects } => {
            service.render_scene(&settings, &objects).await?
        }
        ServiceCall::Immediate(output) => output,
    };
    Ok(output)
}
