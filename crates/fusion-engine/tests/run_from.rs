//! End-to-end runs through the public engine API

use std::sync::Arc;

use fusion_engine::testing::MockGenerationService;
use fusion_engine::{
    BlendMode, EngineError, EngineEvent, FusionEngine, GraphBuilder, ImageData, Node, NodeEdit,
    NodeKind, NodeRunState, PortId, VecEventSink,
};
use tokio_test::{assert_err, assert_ok};

fn image(data: &str) -> ImageData {
    ImageData::new("image/png", data)
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test]
async fn text_source_feeds_weighted_combine() {
    init_logging();
    let mock = Arc::new(MockGenerationService::new());
    let mut engine = FusionEngine::new(mock.clone());

    engine.add_node(Node::text_source("a", "a red cube").labeled("Cube")).unwrap();
    engine.add_node(Node::new("b", NodeKind::Combine)).unwrap();
    let edge = engine.connect("a", PortId::IMAGE, "b", PortId::Slot(0)).unwrap();
    engine
        .set_combine_input("b", &edge, 0.6, BlendMode::AdditiveConcept)
        .unwrap();

    let report = engine.run_from("b").await.unwrap();

    assert_eq!(report.order, vec!["a", "b"]);
    assert_eq!(mock.operations(), vec!["text_to_image", "combine_images"]);

    let calls = mock.calls();
    assert_eq!(calls[0].text, "a red cube");
    let combine = &calls[1];
    assert!(combine
        .text
        .contains("- The concept of \"Cube\" (with influence a balanced and significant fusion (60%))."));
    assert_eq!(combine.images, vec![image("rendered:a red cube")]);

    let b = engine.graph().find_node("b").unwrap();
    assert_eq!(b.output.as_ref().and_then(|o| o.image.clone()), Some(image("combined:1")));

    // Unchanged upstream is reused; the target itself always re-runs
    mock.clear_calls();
    let again = engine.run_from("b").await.unwrap();
    assert_eq!(again.skipped, vec!["a"]);
    assert_eq!(mock.operations(), vec!["combine_images"]);
}

#[tokio::test]
async fn second_run_reuses_outputs() {
    let mock = Arc::new(MockGenerationService::new());
    let graph = GraphBuilder::new()
        .add_node(Node::raw_image("photo", image("photo")))
        .add_node(Node::new("style", NodeKind::StyleExtractor))
        .add_node(Node::text_source("subject", "a lighthouse"))
        .add_node(Node::new("combine", NodeKind::Combine))
        .connect("photo", PortId::IMAGE, "style", PortId::IMAGE)
        .connect("style", PortId::Text, "combine", PortId::Prompt)
        .connect("subject", PortId::IMAGE, "combine", PortId::Slot(0))
        .build()
        .unwrap();
    let mut engine = FusionEngine::new(mock.clone()).with_graph(graph);

    let first = engine.run_from("combine").await.unwrap();
    assert_eq!(first.executed, vec!["style", "subject", "combine"]);

    mock.clear_calls();
    let second = engine.run_from("combine").await.unwrap();
    assert_eq!(second.executed, vec!["combine"]);
    assert_eq!(second.states["style"], NodeRunState::Skipped);
    assert_eq!(mock.operations(), vec!["combine_images"]);

    // With the target already valid, running an upstream node only re-runs that node
    mock.clear_calls();
    engine.run_from("style").await.unwrap();
    assert_eq!(mock.operations(), vec!["extract_style"]);
}

#[tokio::test]
async fn image_edit_invalidates_everything_downstream() {
    let mock = Arc::new(MockGenerationService::new());
    let graph = GraphBuilder::new()
        .add_node(Node::raw_image("photo", image("v1")))
        .add_node(Node::new("analyze", NodeKind::Analyze))
        .add_node(Node::new("enhance", NodeKind::EnhanceText).instructed("shorter"))
        .add_node(Node::new("combine", NodeKind::Combine))
        .add_node(Node::text_source("other", "unrelated"))
        .connect("photo", PortId::IMAGE, "analyze", PortId::IMAGE)
        .connect("analyze", PortId::Text, "enhance", PortId::Text)
        .connect("enhance", PortId::Text, "combine", PortId::Prompt)
        .connect("photo", PortId::IMAGE, "combine", PortId::Slot(0))
        .build()
        .unwrap();
    let mut engine = FusionEngine::new(mock.clone()).with_graph(graph);

    engine.run_from("combine").await.unwrap();
    engine.run_from("other").await.unwrap();

    let cleared = engine
        .update_node_data("photo", NodeEdit::image(image("v2")))
        .unwrap();
    let cleared: Vec<&str> = cleared.iter().map(String::as_str).collect();
    assert_eq!(cleared, vec!["analyze", "combine", "enhance"]);

    for id in ["analyze", "enhance", "combine"] {
        assert!(engine.graph().find_node(id).unwrap().output.is_none(), "{} kept output", id);
    }
    assert!(engine.graph().find_node("other").unwrap().output.is_some());

    // The next run picks up the new image everywhere
    mock.clear_calls();
    engine.run_from("combine").await.unwrap();
    let calls = mock.calls();
    assert_eq!(calls[0].images, vec![image("v2")]);
    assert_eq!(calls.last().unwrap().images, vec![image("v2")]);
}

#[tokio::test]
async fn cycle_is_rejected_without_side_effects() {
    let mock = Arc::new(MockGenerationService::new());
    let sink = Arc::new(VecEventSink::new());
    let mut engine = FusionEngine::new(mock.clone()).with_event_sink(sink.clone());

    engine.add_node(Node::new("x", NodeKind::DetailRefine).instructed("a")).unwrap();
    engine.add_node(Node::new("y", NodeKind::DetailRefine).instructed("b")).unwrap();
    engine.add_node(Node::new("z", NodeKind::Combine)).unwrap();
    assert_ok!(engine.connect("x", PortId::IMAGE, "y", PortId::IMAGE));
    assert_ok!(engine.connect("y", PortId::IMAGE, "x", PortId::IMAGE));
    assert_ok!(engine.connect("y", PortId::IMAGE, "z", PortId::Slot(0)));

    let err = assert_err!(engine.run_from("z").await);
    assert!(matches!(err, EngineError::CycleDetected { ref node_id } if node_id == "z"));
    assert_eq!(mock.call_count(), 0);

    for node in engine.graph().nodes() {
        assert!(!node.is_processing);
        assert!(node.output.is_none());
    }
    assert!(engine.graph().find_node("z").unwrap().error_message.is_some());
    assert!(matches!(sink.events().last(), Some(EngineEvent::RunFailed { .. })));
}

#[tokio::test]
async fn failure_halts_the_run() {
    let mock = Arc::new(MockGenerationService::new());
    mock.fail_on("text_to_image", "The prompt was blocked");
    let graph = GraphBuilder::new()
        .add_node(Node::text_source("a", "a red cube"))
        .add_node(Node::raw_image("r", image("photo")))
        .add_node(Node::new("style", NodeKind::StyleExtractor))
        .add_node(Node::new("b", NodeKind::Combine))
        .connect("a", PortId::IMAGE, "b", PortId::Slot(0))
        .connect("r", PortId::IMAGE, "style", PortId::IMAGE)
        .connect("style", PortId::Text, "b", PortId::Prompt)
        .build()
        .unwrap();
    let mut engine = FusionEngine::new(mock.clone()).with_graph(graph);

    let err = engine.run_from("b").await.unwrap_err();
    assert!(matches!(&err, EngineError::NodeFailed { node_id, .. } if node_id == "a"));
    assert_eq!(err.node_message(), "The prompt was blocked");

    // "a" runs first; nothing after it is touched
    assert_eq!(mock.operations(), vec!["text_to_image"]);
    let a = engine.graph().find_node("a").unwrap();
    assert_eq!(a.error_message.as_deref(), Some("The prompt was blocked"));
    for id in ["style", "b"] {
        let node = engine.graph().find_node(id).unwrap();
        assert!(node.output.is_none());
        assert!(node.error_message.is_none());
        assert!(!node.is_processing);
    }
}

#[tokio::test]
async fn deleting_a_source_prunes_only_its_combine_entry() {
    let mock = Arc::new(MockGenerationService::new());
    let mut engine = FusionEngine::new(mock.clone());

    engine.add_node(Node::text_source("a", "a red cube")).unwrap();
    engine.add_node(Node::raw_image("p", image("p"))).unwrap();
    engine.add_node(Node::raw_image("q", image("q"))).unwrap();
    engine.add_node(Node::new("b", NodeKind::Combine)).unwrap();
    let e_p = engine.connect("p", PortId::IMAGE, "b", PortId::Slot(0)).unwrap();
    let e_a = engine.connect("a", PortId::IMAGE, "b", PortId::Slot(1)).unwrap();
    let e_q = engine.connect("q", PortId::IMAGE, "b", PortId::Slot(2)).unwrap();
    engine
        .set_combine_input("b", &e_a, 0.6, BlendMode::AdditiveConcept)
        .unwrap();
    engine
        .set_combine_input("b", &e_q, 0.2, BlendMode::NegativeGuide)
        .unwrap();

    engine.delete_node("a").unwrap();

    let graph = engine.graph();
    assert!(graph.find_edge(&e_a).is_none());
    let inputs = graph.find_node("b").unwrap().combine_inputs();
    let ids: Vec<&str> = inputs.iter().map(|c| c.edge_id.as_str()).collect();
    assert_eq!(ids, vec![e_p.as_str(), e_q.as_str()]);
    assert_eq!(inputs[1].influence, 0.2);
    assert_eq!(inputs[1].blend_mode, BlendMode::NegativeGuide);
}

#[test]
fn occupied_input_keeps_first_edge() {
    let mock = Arc::new(MockGenerationService::new());
    let mut engine = FusionEngine::new(mock);
    engine.add_node(Node::raw_image("p", image("p"))).unwrap();
    engine.add_node(Node::raw_image("q", image("q"))).unwrap();
    engine.add_node(Node::new("x", NodeKind::Analyze)).unwrap();

    let first = engine.connect("p", PortId::IMAGE, "x", PortId::IMAGE).unwrap();
    let err = engine
        .connect("q", PortId::IMAGE, "x", PortId::IMAGE)
        .unwrap_err();
    assert!(matches!(err, EngineError::PortOccupied { .. }));

    // Disconnecting frees the port again
    engine.disconnect(&first).unwrap();
    assert_ok!(engine.connect("q", PortId::IMAGE, "x", PortId::IMAGE));

    let report = tokio_test::block_on(engine.run_from("x")).unwrap();
    assert_eq!(report.executed, vec!["x"]);
    let x = engine.graph().find_node("x").unwrap();
    assert_eq!(x.output.as_ref().and_then(|o| o.text.as_deref()), Some("analysis of q"));
}
