//! Core types for generation graphs
//!
//! These types define the structure of a generation graph: nodes with
//! kind-specific payloads, typed ports, edges, and cached outputs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::defaults;

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Identifier of a connection point on a node
///
/// Image inputs and outputs are numbered slots. Text inputs use one of two
/// reserved symbolic ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortId {
    /// Numbered image slot
    Slot(u32),
    /// The prompt input of a combine node
    Prompt,
    /// Generic text port
    Text,
}

impl PortId {
    /// The primary image slot
    pub const IMAGE: PortId = PortId::Slot(0);
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slot(n) => write!(f, "{}", n),
            Self::Prompt => write!(f, "prompt"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// Which side of a node a port sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    Input,
    Output,
}

/// Semantic type carried by a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDataType {
    /// Image data
    Image,
    /// Text string
    Text,
}

/// Image payload as base64 data plus its MIME type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageData {
    /// MIME type (e.g. "image/png")
    pub mime_type: String,
    /// Base64 encoded image bytes
    pub data: String,
}

impl ImageData {
    /// Create image data from a MIME type and base64 payload
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Parse a `data:<mime>;base64,<payload>` URL
    pub fn from_data_url(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        let mime_type = header.strip_suffix(";base64")?;
        if mime_type.is_empty() {
            return None;
        }
        Some(Self::new(mime_type, payload))
    }

    /// Render as a `data:` URL
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Cached result of a node's last successful execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageData>,
}

impl NodeOutput {
    /// Output holding only text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    /// Output holding only an image
    pub fn image(image: ImageData) -> Self {
        Self {
            text: None,
            image: Some(image),
        }
    }

    /// Whether the output carries non-empty text
    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Whether the output carries an image
    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

/// The closed set of node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// Uploaded image, no generation behavior
    RawImage,
    /// Authored text, rendered to an image on run
    TextSource,
    /// Image to text description
    Analyze,
    /// Image to subject-agnostic style directive
    StyleExtractor,
    /// Text rewritten by an instruction
    EnhanceText,
    /// Weighted fusion of many inputs into one image
    Combine,
    /// Object images placed in a rendered scene
    SceneCompose,
    /// Instruction-driven (optionally masked) image edit
    DetailRefine,
}

impl NodeKind {
    /// All kinds, in declaration order
    pub const ALL: [NodeKind; 8] = [
        NodeKind::RawImage,
        NodeKind::TextSource,
        NodeKind::Analyze,
        NodeKind::StyleExtractor,
        NodeKind::EnhanceText,
        NodeKind::Combine,
        NodeKind::SceneCompose,
        NodeKind::DetailRefine,
    ];

    /// Stable identifier used in serialization and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RawImage => "raw-image",
            Self::TextSource => "text-source",
            Self::Analyze => "analyze",
            Self::StyleExtractor => "style-extractor",
            Self::EnhanceText => "enhance-text",
            Self::Combine => "combine",
            Self::SceneCompose => "scene-compose",
            Self::DetailRefine => "detail-refine",
        }
    }

    /// Label given to freshly created nodes
    pub fn default_label(&self) -> &'static str {
        match self {
            Self::RawImage => "Input Image",
            Self::TextSource => "Text",
            Self::Analyze => "Analyze",
            Self::StyleExtractor => "Style Extractor",
            Self::EnhanceText => "Text Refiner",
            Self::Combine => "Combine",
            Self::SceneCompose => "Scene",
            Self::DetailRefine => "Detail",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an image input of a combine node is folded into the directive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    /// The image's concept becomes a subject
    #[default]
    AdditiveConcept,
    /// The image lists things to avoid
    NegativeGuide,
    /// Only the image's aesthetics are borrowed
    StyleReference,
    /// The image is an ordered element of a composed scene
    SceneCompositionElement,
    /// Treated like a subject concept
    Passthrough,
}

/// Per-edge blend configuration of a combine node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombineInputConfig {
    /// The image edge this entry configures
    pub edge_id: EdgeId,
    /// Weight in [0, 1]
    pub influence: f32,
    pub blend_mode: BlendMode,
}

impl CombineInputConfig {
    /// Entry given to a newly connected image edge
    pub fn new(edge_id: impl Into<EdgeId>) -> Self {
        Self {
            edge_id: edge_id.into(),
            influence: defaults::COMBINE_INFLUENCE,
            blend_mode: BlendMode::AdditiveConcept,
        }
    }

    pub fn with_influence(mut self, influence: f32) -> Self {
        self.influence = influence.clamp(0.0, 1.0);
        self
    }

    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }
}

/// Camera elevation of a rendered scene
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraElevation {
    #[default]
    EyeLevel,
    LowAngle,
    HighAngle,
    TopDown,
}

impl CameraElevation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EyeLevel => "eye-level",
            Self::LowAngle => "low-angle",
            Self::HighAngle => "high-angle",
            Self::TopDown => "top-down",
        }
    }
}

/// Render style of a scene
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderStyle {
    #[default]
    PhotorealisticDay,
    PhotorealisticNight,
    ArchitecturalSketch,
    ClayModel,
}

impl RenderStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PhotorealisticDay => "photorealistic-day",
            Self::PhotorealisticNight => "photorealistic-night",
            Self::ArchitecturalSketch => "architectural-sketch",
            Self::ClayModel => "clay-model",
        }
    }
}

/// Facing direction of an object placed in a scene
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectRotation {
    #[default]
    Front,
    Left,
    Right,
    Back,
}

impl ObjectRotation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Left => "left",
            Self::Right => "right",
            Self::Back => "back",
        }
    }
}

/// Placement of one connected node inside a scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneObjectSettings {
    pub node_id: NodeId,
    /// Fraction of natural size
    pub scale: f32,
    pub rotation: ObjectRotation,
}

impl SceneObjectSettings {
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            scale: 1.0,
            rotation: ObjectRotation::Front,
        }
    }
}

/// Global render settings of a scene-compose node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSettings {
    pub camera_elevation: CameraElevation,
    pub render_style: RenderStyle,
    #[serde(default)]
    pub objects: Vec<SceneObjectSettings>,
}

impl SceneSettings {
    /// Align object settings with the currently connected nodes
    ///
    /// Settings for disconnected nodes are dropped; connected nodes without
    /// settings are appended with defaults, in connection order.
    pub fn reconciled(&self, connected: &[NodeId]) -> SceneSettings {
        let mut objects: Vec<SceneObjectSettings> = self
            .objects
            .iter()
            .filter(|o| connected.contains(&o.node_id))
            .cloned()
            .collect();
        for node_id in connected {
            if !objects.iter().any(|o| &o.node_id == node_id) {
                objects.push(SceneObjectSettings::new(node_id.clone()));
            }
        }
        SceneSettings {
            camera_elevation: self.camera_elevation,
            render_style: self.render_style,
            objects,
        }
    }
}

/// One object handed to the scene renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneObject {
    pub label: String,
    pub image: ImageData,
    pub scale: f32,
    pub rotation: ObjectRotation,
}

/// Payload of a raw image source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawImagePayload {
    #[serde(default)]
    pub image: Option<ImageData>,
}

/// Payload of a text source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextSourcePayload {
    #[serde(default)]
    pub text: String,
}

/// Payload of a style extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleExtractorPayload {
    /// Intensity in [0, 1]; 0 yields an empty directive
    pub intensity: f32,
}

impl Default for StyleExtractorPayload {
    fn default() -> Self {
        Self {
            intensity: defaults::STYLE_INTENSITY,
        }
    }
}

/// Payload of a combine node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombinePayload {
    /// Ordered per-image-edge configuration
    #[serde(default)]
    pub inputs: Vec<CombineInputConfig>,
}

/// Payload of a scene-compose node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenePayload {
    #[serde(default)]
    pub settings: SceneSettings,
}

/// Payload of a detail-refine node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailRefinePayload {
    /// White marks the edit area, black is preserved
    #[serde(default)]
    pub mask: Option<ImageData>,
}

/// Kind-specific data of a node, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NodePayload {
    RawImage(RawImagePayload),
    TextSource(TextSourcePayload),
    Analyze,
    StyleExtractor(StyleExtractorPayload),
    EnhanceText,
    Combine(CombinePayload),
    SceneCompose(ScenePayload),
    DetailRefine(DetailRefinePayload),
}

impl NodePayload {
    /// Fresh payload for a kind
    pub fn for_kind(kind: NodeKind) -> Self {
        match kind {
            NodeKind::RawImage => Self::RawImage(RawImagePayload::default()),
            NodeKind::TextSource => Self::TextSource(TextSourcePayload::default()),
            NodeKind::Analyze => Self::Analyze,
            NodeKind::StyleExtractor => Self::StyleExtractor(StyleExtractorPayload::default()),
            NodeKind::EnhanceText => Self::EnhanceText,
            NodeKind::Combine => Self::Combine(CombinePayload::default()),
            NodeKind::SceneCompose => Self::SceneCompose(ScenePayload::default()),
            NodeKind::DetailRefine => Self::DetailRefine(DetailRefinePayload::default()),
        }
    }

    /// The kind tag
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::RawImage(_) => NodeKind::RawImage,
            Self::TextSource(_) => NodeKind::TextSource,
            Self::Analyze => NodeKind::Analyze,
            Self::StyleExtractor(_) => NodeKind::StyleExtractor,
            Self::EnhanceText => NodeKind::EnhanceText,
            Self::Combine(_) => NodeKind::Combine,
            Self::SceneCompose(_) => NodeKind::SceneCompose,
            Self::DetailRefine(_) => NodeKind::DetailRefine,
        }
    }
}

/// A node instance in a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier for this node instance
    pub id: NodeId,
    /// Human-readable label, used by the compositor
    pub label: String,
    /// Kind tag plus kind-specific data
    pub payload: NodePayload,
    /// Free-form instruction; empty means none
    #[serde(default)]
    pub instruction: String,
    /// Cached output of the last successful run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<NodeOutput>,
    #[serde(default)]
    pub is_processing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Node {
    /// Create a node of the given kind with default payload and label
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self::with_payload(id, NodePayload::for_kind(kind))
    }

    /// Create a node from an explicit payload
    pub fn with_payload(id: impl Into<NodeId>, payload: NodePayload) -> Self {
        Self {
            id: id.into(),
            label: payload.kind().default_label().to_string(),
            payload,
            instruction: String::new(),
            output: None,
            is_processing: false,
            error_message: None,
        }
    }

    /// Raw image source holding an uploaded image
    pub fn raw_image(id: impl Into<NodeId>, image: ImageData) -> Self {
        Self::with_payload(id, NodePayload::RawImage(RawImagePayload { image: Some(image) }))
    }

    /// Text source holding authored text
    pub fn text_source(id: impl Into<NodeId>, text: impl Into<String>) -> Self {
        Self::with_payload(
            id,
            NodePayload::TextSource(TextSourcePayload { text: text.into() }),
        )
    }

    /// Set the label
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the instruction text
    pub fn instructed(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Set a cached output
    pub fn with_output(mut self, output: NodeOutput) -> Self {
        self.output = Some(output);
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.payload.kind()
    }

    /// Instruction text if non-blank
    pub fn instruction(&self) -> Option<&str> {
        let trimmed = self.instruction.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// The image this node offers downstream: its output image, else its authored image
    pub fn image(&self) -> Option<&ImageData> {
        self.output
            .as_ref()
            .and_then(|o| o.image.as_ref())
            .or_else(|| match &self.payload {
                NodePayload::RawImage(p) => p.image.as_ref(),
                _ => None,
            })
    }

    /// The text this node offers downstream: authored text for text sources,
    /// output text otherwise
    pub fn text(&self) -> Option<&str> {
        let text = match &self.payload {
            NodePayload::TextSource(p) => Some(p.text.as_str()),
            _ => self.output.as_ref().and_then(|o| o.text.as_deref()),
        };
        text.filter(|t| !t.is_empty())
    }

    /// Combine configuration entries, empty for other kinds
    pub fn combine_inputs(&self) -> &[CombineInputConfig] {
        match &self.payload {
            NodePayload::Combine(p) => &p.inputs,
            _ => &[],
        }
    }
}

/// An edge connecting an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// Source node ID
    pub source: NodeId,
    /// Source output port
    pub source_port: PortId,
    /// Target node ID
    pub target: NodeId,
    /// Target input port
    pub target_port: PortId,
}

/// Partial update of a node's runtime fields
///
/// `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeUpdate {
    pub output: Option<Option<NodeOutput>>,
    pub is_processing: Option<bool>,
    pub error_message: Option<Option<String>>,
}

impl NodeUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(mut self, output: Option<NodeOutput>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn processing(mut self, processing: bool) -> Self {
        self.is_processing = Some(processing);
        self
    }

    pub fn error(mut self, message: Option<String>) -> Self {
        self.error_message = Some(message);
        self
    }
}

/// User edit of a node's authored data
///
/// `image` and `text` are source data: changing them invalidates every
/// downstream output. The remaining fields never do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEdit {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
    /// New contents of a raw image source
    #[serde(default)]
    pub image: Option<ImageData>,
    /// New authored text of a text source
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub style_intensity: Option<f32>,
    #[serde(default)]
    pub scene_settings: Option<SceneSettings>,
    /// `Some(None)` removes the mask
    #[serde(default)]
    pub mask: Option<Option<ImageData>>,
}

impl NodeEdit {
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn instruction(instruction: impl Into<String>) -> Self {
        Self {
            instruction: Some(instruction.into()),
            ..Self::default()
        }
    }

    pub fn image(image: ImageData) -> Self {
        Self {
            image: Some(image),
            ..Self::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn style_intensity(intensity: f32) -> Self {
        Self {
            style_intensity: Some(intensity),
            ..Self::default()
        }
    }

    pub fn scene_settings(settings: SceneSettings) -> Self {
        Self {
            scene_settings: Some(settings),
            ..Self::default()
        }
    }

    pub fn mask(mask: Option<ImageData>) -> Self {
        Self {
            mask: Some(mask),
            ..Self::default()
        }
    }
}
