//! Fluent builder for generation graphs
//!
//! Provides a fluent API for constructing graphs programmatically. Every
//! node and connection is validated by `Graph` when `build` is called.

use crate::error::Result;
use crate::graph::Graph;
use crate::types::{BlendMode, Node, NodeId, PortId};

struct PendingEdge {
    source: NodeId,
    source_port: PortId,
    target: NodeId,
    target_port: PortId,
    blend: Option<(f32, BlendMode)>,
}

/// Fluent builder for constructing generation graphs
///
/// # Example
///
/// ```ignore
/// let graph = GraphBuilder::new()
///     .add_node(Node::text_source("a", "a red cube"))
///     .add_node(Node::new("b", NodeKind::Combine))
///     .connect("a", PortId::IMAGE, "b", PortId::Slot(0))
///     .with_blend(0.6, BlendMode::AdditiveConcept)
///     .build()?;
/// ```
#[derive(Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    edges: Vec<PendingEdge>,
}

impl GraphBuilder {
    /// Create a new graph builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph
    pub fn add_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Connect an output port to an input port
    pub fn connect(
        mut self,
        source: impl Into<NodeId>,
        source_port: PortId,
        target: impl Into<NodeId>,
        target_port: PortId,
    ) -> Self {
        self.edges.push(PendingEdge {
            source: source.into(),
            source_port,
            target: target.into(),
            target_port,
            blend: None,
        });
        self
    }

    /// Set the combine configuration of the most recent connection
    ///
    /// Must be called immediately after `connect` for an image edge into a
    /// combine node.
    pub fn with_blend(mut self, influence: f32, blend_mode: BlendMode) -> Self {
        if let Some(edge) = self.edges.last_mut() {
            edge.blend = Some((influence, blend_mode));
        }
        self
    }

    /// Build and validate the graph
    pub fn build(self) -> Result<Graph> {
        let mut graph = Graph::new();
        for node in self.nodes {
            graph.add_node(node)?;
        }
        for edge in self.edges {
            let edge_id = graph.add_edge(
                &edge.source,
                edge.source_port,
                &edge.target,
                edge.target_port,
            )?;
            if let Some((influence, blend_mode)) = edge.blend {
                graph.set_combine_input(&edge.target, &edge_id, influence, blend_mode)?;
            }
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::types::{ImageData, NodeKind};

    #[test]
    fn test_graph_builder_basic() {
        let graph = GraphBuilder::new()
            .add_node(Node::text_source("a", "a red cube"))
            .add_node(Node::raw_image("r", ImageData::new("image/png", "AAAA")))
            .add_node(Node::new("b", NodeKind::Combine))
            .connect("a", PortId::Text, "b", PortId::Prompt)
            .connect("r", PortId::IMAGE, "b", PortId::Slot(0))
            .with_blend(0.4, BlendMode::StyleReference)
            .build()
            .unwrap();

        assert_eq!(graph.nodes().len(), 3);
        assert_eq!(graph.edges().len(), 2);

        let inputs = graph.find_node("b").unwrap().combine_inputs();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].influence, 0.4);
        assert_eq!(inputs[0].blend_mode, BlendMode::StyleReference);
    }

    #[test]
    fn test_graph_builder_rejects_bad_connection() {
        let result = GraphBuilder::new()
            .add_node(Node::new("x", NodeKind::Analyze))
            .add_node(Node::new("y", NodeKind::Analyze))
            .connect("x", PortId::Text, "y", PortId::IMAGE)
            .build();

        assert!(matches!(result, Err(EngineError::InvalidConnection(_))));
    }
}
