//! The engine facade
//!
//! `FusionEngine` owns a graph, a generation service and an event sink, and
//! is the only public path that changes source data. Every source edit goes
//! through `update_node_data`, which invalidates downstream outputs in the
//! same call, so a stale output can never survive an edit.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::time::Instant;

use crate::compositor;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::events::{emit, EngineEvent, EventSink, NullEventSink};
use crate::graph::Graph;
use crate::invalidation;
use crate::scheduler::{self, RunReport};
use crate::service::GenerationService;
use crate::types::{
    BlendMode, Edge, EdgeId, ImageData, Node, NodeEdit, NodeId, NodeKind, NodeOutput, NodeUpdate,
    PortId,
};

/// Incremental executor for a single generation graph
pub struct FusionEngine {
    graph: Graph,
    service: Arc<dyn GenerationService>,
    event_sink: Arc<dyn EventSink>,
    config: EngineConfig,
    /// When each visible failure message should be removed
    error_deadlines: HashMap<NodeId, Instant>,
}

impl FusionEngine {
    /// Create an engine with an empty graph
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self {
            graph: Graph::new(),
            service,
            event_sink: Arc::new(NullEventSink),
            config: EngineConfig::default(),
            error_deadlines: HashMap::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_event_sink(mut self, event_sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = event_sink;
        self
    }

    /// Start from an existing graph
    pub fn with_graph(mut self, graph: Graph) -> Self {
        self.graph = graph;
        self
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    // ---------------------------------------------------------------------
    // Structure
    // ---------------------------------------------------------------------

    pub fn add_node(&mut self, node: Node) -> Result<()> {
        log::debug!("Adding {} node '{}'", node.kind(), node.id);
        self.graph.add_node(node)
    }

    /// Connect `from`'s output port to `to`'s input port
    pub fn connect(
        &mut self,
        from: &str,
        from_port: PortId,
        to: &str,
        to_port: PortId,
    ) -> Result<EdgeId> {
        let edge_id = self.graph.add_edge(from, from_port, to, to_port)?;
        log::debug!("Connected {} -> {} as '{}'", from, to, edge_id);
        Ok(edge_id)
    }

    pub fn disconnect(&mut self, edge_id: &str) -> Result<Edge> {
        let edge = self.graph.remove_edge(edge_id)?;
        log::debug!("Removed edge '{}'", edge_id);
        Ok(edge)
    }

    /// Delete a node along with its edges and combine entries
    pub fn delete_node(&mut self, node_id: &str) -> Result<Node> {
        let node = self.graph.remove_node(node_id)?;
        self.error_deadlines.remove(node_id);
        log::debug!("Deleted node '{}'", node_id);
        Ok(node)
    }

    // ---------------------------------------------------------------------
    // Edits
    // ---------------------------------------------------------------------

    /// Apply a user edit, invalidating downstream outputs on a source change
    ///
    /// Returns the set of nodes whose outputs were cleared.
    pub fn update_node_data(&mut self, node_id: &str, edit: NodeEdit) -> Result<BTreeSet<NodeId>> {
        if !self.graph.apply_edit(node_id, &edit)? {
            return Ok(BTreeSet::new());
        }

        let cleared = invalidation::invalidate_downstream(&mut self.graph, node_id);

        log::info!(
            "Source data of '{}' changed; cleared {} output(s)",
            node_id,
            cleared.len()
        );
        emit(
            self.event_sink.as_ref(),
            EngineEvent::OutputsInvalidated {
                origin: node_id.to_string(),
                cleared: cleared.iter().cloned().collect(),
            },
        );
        Ok(cleared)
    }

    /// Reorder a combine node's inputs; `order` lists every configured edge once
    pub fn reorder_combine_inputs(&mut self, node_id: &str, order: &[EdgeId]) -> Result<()> {
        self.graph.reorder_combine_inputs(node_id, order)
    }

    /// Set the influence (clamped to [0, 1]) and blend mode of a combine input
    pub fn set_combine_input(
        &mut self,
        node_id: &str,
        edge_id: &str,
        influence: f32,
        blend_mode: BlendMode,
    ) -> Result<()> {
        self.graph
            .set_combine_input(node_id, edge_id, influence, blend_mode)
    }

    // ---------------------------------------------------------------------
    // Execution
    // ---------------------------------------------------------------------

    /// Run a node, first running any upstream node without a valid output
    ///
    /// Halts at the first failure; the failure stays on the failing node
    /// until `clear_expired_errors` removes it.
    pub async fn run_from(&mut self, node_id: &str) -> Result<RunReport> {
        let result = scheduler::execute(
            &mut self.graph,
            node_id,
            self.service.as_ref(),
            &self.config,
            self.event_sink.as_ref(),
        )
        .await;

        if let Err(err) = &result {
            let failed = match err {
                EngineError::NodeFailed { node_id, .. } => Some(node_id.clone()),
                EngineError::CycleDetected { node_id } => Some(node_id.clone()),
                _ => None,
            };
            if let Some(failed) = failed {
                self.schedule_error_clear(failed);
            }
        }
        result
    }

    /// Ask the service for prompt ideas based on a combine node's inputs
    ///
    /// Requires at least one connected image. Failures are recorded on the
    /// node like run failures.
    pub async fn suggest_prompts(&mut self, node_id: &str) -> Result<Vec<String>> {
        self.begin_side_task(node_id)?;

        let result = match compositor::compose(&self.graph, node_id) {
            Ok(composite) if composite.images.is_empty() => Err(EngineError::missing(
                "connect at least one image to get suggestions",
            )),
            Ok(composite) => self
                .service
                .suggest_prompts(&composite.images, &composite.text)
                .await
                .map_err(EngineError::from),
            Err(err) => Err(err),
        };

        self.finish_side_task(node_id, result)
    }

    /// Ask the service for variations of a text source's authored text
    ///
    /// Returns an empty list without calling the service when the text is empty.
    pub async fn suggest_text_variations(&mut self, node_id: &str) -> Result<Vec<String>> {
        let node = self.graph.node(node_id)?;
        if node.kind() != NodeKind::TextSource {
            return Err(EngineError::invalid_config(format!(
                "node '{}' is not a text node",
                node_id
            )));
        }
        let Some(text) = node.text().map(str::to_string) else {
            return Ok(Vec::new());
        };

        self.begin_side_task(node_id)?;
        let result = self
            .service
            .suggest_text_variations(&text)
            .await
            .map_err(EngineError::from);
        self.finish_side_task(node_id, result)
    }

    /// Apply a masked edit to an image and store the result as the node's output
    ///
    /// Downstream outputs built from the previous output are cleared.
    pub async fn refine_node(
        &mut self,
        node_id: &str,
        instruction: &str,
        image: &ImageData,
        mask: &ImageData,
    ) -> Result<NodeOutput> {
        self.begin_side_task(node_id)?;
        let result = self
            .service
            .refine_image(instruction, image, mask)
            .await
            .map_err(EngineError::from);
        let output = self.finish_side_task(node_id, result)?;

        self.graph
            .update_node(node_id, NodeUpdate::new().output(Some(output.clone())))?;
        let cleared = invalidation::invalidate_downstream(&mut self.graph, node_id);
        if !cleared.is_empty() {
            emit(
                self.event_sink.as_ref(),
                EngineEvent::OutputsInvalidated {
                    origin: node_id.to_string(),
                    cleared: cleared.into_iter().collect(),
                },
            );
        }
        Ok(output)
    }

    // ---------------------------------------------------------------------
    // Error expiry
    // ---------------------------------------------------------------------

    /// Remove failure messages whose display time has passed
    ///
    /// Hosts call this on their own tick. Returns the nodes that were cleared.
    pub fn clear_expired_errors(&mut self, now: Instant) -> Vec<NodeId> {
        let mut expired: Vec<NodeId> = self
            .error_deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        expired.sort();

        for node_id in &expired {
            self.error_deadlines.remove(node_id);
            if self
                .graph
                .update_node(node_id, NodeUpdate::new().error(None))
                .is_ok()
            {
                emit(
                    self.event_sink.as_ref(),
                    EngineEvent::ErrorCleared {
                        node_id: node_id.clone(),
                    },
                );
            }
        }
        expired
    }

    /// The instant at which a node's failure message will be removed
    pub fn error_deadline(&self, node_id: &str) -> Option<Instant> {
        self.error_deadlines.get(node_id).copied()
    }

    fn schedule_error_clear(&mut self, node_id: NodeId) {
        let deadline = Instant::now() + self.config.error_clear_delay();
        self.error_deadlines.insert(node_id, deadline);
    }

    fn begin_side_task(&mut self, node_id: &str) -> Result<()> {
        self.graph.update_node(
            node_id,
            NodeUpdate::new().processing(true).error(None),
        )
    }

    fn finish_side_task<T>(&mut self, node_id: &str, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.graph
                    .update_node(node_id, NodeUpdate::new().processing(false))?;
                Ok(value)
            }
            Err(err) => {
                let message = err.to_string();
                log::warn!("Node '{}' failed: {}", node_id, message);
                self.graph.update_node(
                    node_id,
                    NodeUpdate::new().processing(false).error(Some(message)),
                )?;
                self.schedule_error_clear(node_id.to_string());
                Err(EngineError::node_failed(node_id, err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::VecEventSink;
    use crate::testing::MockGenerationService;

    fn image(data: &str) -> ImageData {
        ImageData::new("image/png", data)
    }

    fn new_engine(mock: &Arc<MockGenerationService>) -> FusionEngine {
        FusionEngine::new(mock.clone())
    }

    #[tokio::test]
    async fn test_text_edit_invalidates_only_downstream() {
        let mock = Arc::new(MockGenerationService::new());
        let sink = Arc::new(VecEventSink::new());
        let mut engine = new_engine(&mock).with_event_sink(sink.clone());

        engine.add_node(Node::text_source("t", "a red cube")).unwrap();
        engine.add_node(Node::new("c", NodeKind::Combine)).unwrap();
        engine.connect("t", PortId::IMAGE, "c", PortId::Slot(0)).unwrap();
        engine.run_from("c").await.unwrap();
        assert!(engine.graph().find_node("t").unwrap().output.is_some());
        assert!(engine.graph().find_node("c").unwrap().output.is_some());

        // Cosmetic edits leave outputs alone
        let cleared = engine.update_node_data("t", NodeEdit::label("Cube")).unwrap();
        assert!(cleared.is_empty());
        assert!(engine.graph().find_node("c").unwrap().output.is_some());

        let cleared = engine
            .update_node_data("t", NodeEdit::text("a blue cube"))
            .unwrap();
        let ids: Vec<&str> = cleared.iter().map(String::as_str).collect();
        assert_eq!(ids, vec!["c"]);
        assert!(engine.graph().find_node("t").unwrap().output.is_some());
        assert!(engine.graph().find_node("c").unwrap().output.is_none());
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, EngineEvent::OutputsInvalidated { origin, .. } if origin == "t")));
    }

    #[tokio::test]
    async fn test_edit_of_unconnected_text_source_clears_nothing() {
        let mock = Arc::new(MockGenerationService::new());
        let mut engine = new_engine(&mock);
        engine.add_node(Node::text_source("a", "a red cube")).unwrap();
        engine.run_from("a").await.unwrap();

        let cleared = engine
            .update_node_data("a", NodeEdit::text("a green cube"))
            .unwrap();
        assert!(cleared.is_empty());
        assert!(engine.graph().find_node("a").unwrap().output.is_some());
        assert_eq!(engine.graph().find_node("a").unwrap().text(), Some("a green cube"));
    }

    #[tokio::test]
    async fn test_failed_node_error_expires() {
        let mock = Arc::new(MockGenerationService::new());
        mock.fail_on("text_to_image", "quota exceeded");
        let mut engine = new_engine(&mock).with_config(EngineConfig {
            error_clear_delay_ms: 100,
            ..EngineConfig::default()
        });
        engine.add_node(Node::text_source("t", "a red cube")).unwrap();

        let err = engine.run_from("t").await.unwrap_err();
        assert_eq!(err.node_message(), "quota exceeded");
        assert_eq!(
            engine.graph().find_node("t").unwrap().error_message.as_deref(),
            Some("quota exceeded")
        );

        let deadline = engine.error_deadline("t").unwrap();
        assert!(engine
            .clear_expired_errors(deadline - std::time::Duration::from_millis(1))
            .is_empty());
        assert_eq!(engine.clear_expired_errors(deadline), vec!["t"]);
        assert!(engine.graph().find_node("t").unwrap().error_message.is_none());
        assert!(engine.error_deadline("t").is_none());
    }

    #[tokio::test]
    async fn test_suggest_prompts_requires_images() {
        let mock = Arc::new(MockGenerationService::new());
        let mut engine = new_engine(&mock);
        engine.add_node(Node::new("c", NodeKind::Combine)).unwrap();

        let err = engine.suggest_prompts("c").await.unwrap_err();
        assert!(matches!(err.root(), EngineError::MissingInput(_)));
        let node = engine.graph().find_node("c").unwrap();
        assert!(!node.is_processing);
        assert!(node.error_message.is_some());
        assert_eq!(mock.call_count(), 0);

        engine.add_node(Node::raw_image("r", image("photo"))).unwrap();
        engine.connect("r", PortId::IMAGE, "c", PortId::Slot(0)).unwrap();
        let suggestions = engine.suggest_prompts("c").await.unwrap();
        assert_eq!(suggestions.len(), 3);

        let call = &mock.calls()[0];
        assert_eq!(call.operation, "suggest_prompts");
        assert_eq!(call.images, vec![image("photo")]);
        assert!(engine.graph().find_node("c").unwrap().error_message.is_none());
    }

    #[tokio::test]
    async fn test_suggest_text_variations() {
        let mock = Arc::new(MockGenerationService::new());
        let mut engine = new_engine(&mock);
        engine.add_node(Node::text_source("empty", "")).unwrap();
        engine.add_node(Node::text_source("t", "a fox")).unwrap();
        engine.add_node(Node::new("c", NodeKind::Combine)).unwrap();

        assert!(engine.suggest_text_variations("empty").await.unwrap().is_empty());
        assert_eq!(mock.call_count(), 0);

        let variations = engine.suggest_text_variations("t").await.unwrap();
        assert_eq!(variations[0], "a fox, variation 1");

        let err = engine.suggest_text_variations("c").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_refine_node_replaces_output() {
        let mock = Arc::new(MockGenerationService::new());
        let mut engine = new_engine(&mock);
        engine.add_node(Node::raw_image("r", image("photo"))).unwrap();
        engine
            .add_node(Node::new("d", NodeKind::DetailRefine).instructed("add a hat"))
            .unwrap();
        engine
            .add_node(Node::new("x", NodeKind::Analyze))
            .unwrap();
        engine.connect("r", PortId::IMAGE, "d", PortId::IMAGE).unwrap();
        engine.connect("d", PortId::IMAGE, "x", PortId::IMAGE).unwrap();
        engine.run_from("x").await.unwrap();
        assert!(engine.graph().find_node("x").unwrap().output.is_some());

        let output = engine
            .refine_node("d", "remove the hat", &image("combined:1"), &image("mask"))
            .await
            .unwrap();

        assert_eq!(output.image, Some(image("refined:combined:1")));
        let d = engine.graph().find_node("d").unwrap();
        assert_eq!(d.output.as_ref(), Some(&output));
        assert!(!d.is_processing);
        assert!(engine.graph().find_node("x").unwrap().output.is_none());
    }

    #[tokio::test]
    async fn test_delete_node_drops_pending_error() {
        let mock = Arc::new(MockGenerationService::new());
        let mut engine = new_engine(&mock);
        engine.add_node(Node::new("c", NodeKind::Combine)).unwrap();
        assert!(engine.run_from("c").await.is_err());
        assert!(engine.error_deadline("c").is_some());

        engine.delete_node("c").unwrap();
        assert!(engine.error_deadline("c").is_none());
        assert!(engine.graph().nodes().is_empty());
    }
}
