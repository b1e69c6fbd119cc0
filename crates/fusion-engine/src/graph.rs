//! The generation graph model
//!
//! `Graph` owns nodes and edges and enforces structural invariants:
//! port types must match, input ports are single-assignment, and combine
//! configuration entries always reference live edges. It carries no
//! execution behavior and never decides invalidation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::ports;
use crate::types::{
    BlendMode, CombineInputConfig, Edge, EdgeId, Node, NodeEdit, NodeId, NodePayload, NodeUpdate,
    PortDataType, PortId,
};

/// A complete generation graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    /// Nodes in insertion order
    nodes: Vec<Node>,
    /// Edges in insertion order
    edges: Vec<Edge>,
    /// Sequence used to mint edge IDs
    #[serde(default)]
    next_edge_seq: u64,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize the graph for the presentation layer
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Load a graph previously produced by `to_json`
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub(crate) fn find_node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Find a node by ID, failing with `NodeNotFound`
    pub fn node(&self, id: &str) -> Result<&Node> {
        self.find_node(id)
            .ok_or_else(|| EngineError::NodeNotFound(id.to_string()))
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut Node> {
        self.find_node_mut(id)
            .ok_or_else(|| EngineError::NodeNotFound(id.to_string()))
    }

    /// Find an edge by ID
    pub fn find_edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Get edges coming into a node
    pub fn incoming_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Get edges going out of a node
    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// The edge occupying an input port, if any
    pub fn edge_into(&self, node_id: &str, port: PortId) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.target == node_id && e.target_port == port)
    }

    /// Get the IDs of nodes that this node depends on (upstream nodes)
    pub fn get_dependencies(&self, node_id: &str) -> Vec<NodeId> {
        self.incoming_edges(node_id)
            .map(|e| e.source.clone())
            .collect()
    }

    /// Get the IDs of nodes that depend on this node (downstream nodes)
    pub fn get_dependents(&self, node_id: &str) -> Vec<NodeId> {
        self.outgoing_edges(node_id)
            .map(|e| e.target.clone())
            .collect()
    }

    /// Add a node
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.find_node(&node.id).is_some() {
            return Err(EngineError::DuplicateNode(node.id));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Remove a node, its incident edges, and any combine entries for those edges
    pub fn remove_node(&mut self, id: &str) -> Result<Node> {
        let pos = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| EngineError::NodeNotFound(id.to_string()))?;
        let node = self.nodes.remove(pos);

        let removed: HashSet<EdgeId> = self
            .edges
            .iter()
            .filter(|e| e.source == id || e.target == id)
            .map(|e| e.id.clone())
            .collect();
        self.edges.retain(|e| !removed.contains(&e.id));

        if !removed.is_empty() {
            for other in &mut self.nodes {
                if let NodePayload::Combine(payload) = &mut other.payload {
                    payload.inputs.retain(|c| !removed.contains(&c.edge_id));
                }
            }
        }

        Ok(node)
    }

    /// Connect an output port to an input port
    ///
    /// Fails with `InvalidConnection` if either port does not exist, the types
    /// differ, or the node would connect to itself, and with `PortOccupied` if
    /// the input already has an edge. New image edges into a combine node get
    /// a default configuration entry appended.
    pub fn add_edge(
        &mut self,
        source: &str,
        source_port: PortId,
        target: &str,
        target_port: PortId,
    ) -> Result<EdgeId> {
        let source_kind = self.node(source)?.kind();
        let target_kind = self.node(target)?.kind();

        if source == target {
            return Err(EngineError::InvalidConnection(format!(
                "node '{}' cannot connect to itself",
                source
            )));
        }

        let port_type = ports::check_connection(source_kind, source_port, target_kind, target_port)?;

        if self.edge_into(target, target_port).is_some() {
            return Err(EngineError::PortOccupied {
                node_id: target.to_string(),
                port: target_port,
            });
        }

        self.next_edge_seq += 1;
        let id = format!(
            "{}-{}-to-{}-{}-{}",
            source, source_port, target, target_port, self.next_edge_seq
        );
        self.edges.push(Edge {
            id: id.clone(),
            source: source.to_string(),
            source_port,
            target: target.to_string(),
            target_port,
        });

        if port_type == PortDataType::Image {
            if let NodePayload::Combine(payload) = &mut self.node_mut(target)?.payload {
                payload.inputs.push(CombineInputConfig::new(id.clone()));
            }
        }

        Ok(id)
    }

    /// Remove an edge and its combine configuration entry
    pub fn remove_edge(&mut self, edge_id: &str) -> Result<Edge> {
        let pos = self
            .edges
            .iter()
            .position(|e| e.id == edge_id)
            .ok_or_else(|| EngineError::EdgeNotFound(edge_id.to_string()))?;
        let edge = self.edges.remove(pos);

        if let Some(target) = self.find_node_mut(&edge.target) {
            if let NodePayload::Combine(payload) = &mut target.payload {
                payload.inputs.retain(|c| c.edge_id != edge.id);
            }
        }

        Ok(edge)
    }

    /// Update a node's runtime fields (output, processing flag, error)
    ///
    /// Never invalidates anything; that is the caller's decision.
    pub fn update_node(&mut self, id: &str, update: NodeUpdate) -> Result<()> {
        let node = self.node_mut(id)?;
        if let Some(output) = update.output {
            node.output = output;
        }
        if let Some(processing) = update.is_processing {
            node.is_processing = processing;
        }
        if let Some(error) = update.error_message {
            node.error_message = error;
        }
        Ok(())
    }

    /// Apply a user edit; returns whether source data changed
    ///
    /// Crate-private so the only public path that changes source data is the
    /// engine, which always invalidates afterwards.
    pub(crate) fn apply_edit(&mut self, id: &str, edit: &NodeEdit) -> Result<bool> {
        let node = self.node_mut(id)?;
        let mut source_changed = false;

        if let Some(label) = &edit.label {
            node.label = label.clone();
        }
        if let Some(instruction) = &edit.instruction {
            node.instruction = instruction.clone();
        }

        match &mut node.payload {
            NodePayload::RawImage(payload) => {
                if let Some(image) = &edit.image {
                    if payload.image.as_ref() != Some(image) {
                        payload.image = Some(image.clone());
                        source_changed = true;
                    }
                }
            }
            NodePayload::TextSource(payload) => {
                if let Some(text) = &edit.text {
                    if &payload.text != text {
                        payload.text = text.clone();
                        source_changed = true;
                    }
                }
            }
            NodePayload::StyleExtractor(payload) => {
                if let Some(intensity) = edit.style_intensity {
                    payload.intensity = intensity.clamp(0.0, 1.0);
                }
            }
            NodePayload::SceneCompose(payload) => {
                if let Some(settings) = &edit.scene_settings {
                    payload.settings = settings.clone();
                }
            }
            NodePayload::DetailRefine(payload) => {
                if let Some(mask) = &edit.mask {
                    payload.mask = mask.clone();
                }
            }
            NodePayload::Analyze | NodePayload::EnhanceText | NodePayload::Combine(_) => {}
        }

        Ok(source_changed)
    }

    /// Clear the cached output of each listed node
    pub(crate) fn clear_outputs<'a>(&mut self, ids: impl IntoIterator<Item = &'a NodeId>) {
        let ids: HashSet<&NodeId> = ids.into_iter().collect();
        for node in &mut self.nodes {
            if ids.contains(&node.id) {
                node.output = None;
            }
        }
    }

    /// Reorder a combine node's input configuration
    ///
    /// `order` must be a permutation of the node's configured edge IDs.
    pub fn reorder_combine_inputs(&mut self, node_id: &str, order: &[EdgeId]) -> Result<()> {
        let node = self.node_mut(node_id)?;
        let NodePayload::Combine(payload) = &mut node.payload else {
            return Err(EngineError::invalid_config(format!(
                "node '{}' is not a combine node",
                node_id
            )));
        };

        let current: HashSet<&EdgeId> = payload.inputs.iter().map(|c| &c.edge_id).collect();
        let requested: HashSet<&EdgeId> = order.iter().collect();
        if order.len() != payload.inputs.len() || current != requested {
            return Err(EngineError::invalid_config(
                "reordered inputs must list every configured edge exactly once",
            ));
        }

        let mut reordered = Vec::with_capacity(order.len());
        for edge_id in order {
            if let Some(pos) = payload.inputs.iter().position(|c| &c.edge_id == edge_id) {
                reordered.push(payload.inputs.remove(pos));
            }
        }
        payload.inputs = reordered;
        Ok(())
    }

    /// Change the influence and blend mode of one combine input
    pub fn set_combine_input(
        &mut self,
        node_id: &str,
        edge_id: &str,
        influence: f32,
        blend_mode: BlendMode,
    ) -> Result<()> {
        let node = self.node_mut(node_id)?;
        let NodePayload::Combine(payload) = &mut node.payload else {
            return Err(EngineError::invalid_config(format!(
                "node '{}' is not a combine node",
                node_id
            )));
        };
        let entry = payload
            .inputs
            .iter_mut()
            .find(|c| c.edge_id == edge_id)
            .ok_or_else(|| EngineError::EdgeNotFound(edge_id.to_string()))?;
        entry.influence = influence.clamp(0.0, 1.0);
        entry.blend_mode = blend_mode;
        Ok(())
    }
}
