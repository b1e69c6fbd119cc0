//! Fusion Engine - Incremental execution of multimodal generation graphs
//!
//! This crate turns a user-edited graph of image and text generation steps
//! into an ordered, incrementally re-executable pipeline. It supports:
//!
//! - Typed ports (image / text) with single-assignment inputs
//! - Downstream invalidation whenever source data changes
//! - Demand-driven runs that reuse every still-valid upstream output
//! - A deterministic prompt compositor that folds weighted, blend-tagged
//!   inputs into one directive for a single generation call
//!
//! # Architecture
//!
//! - `Graph`: structure and invariants, no behavior
//! - `invalidation`: transitive downstream closure of an edited node
//! - `scheduler`: dependency ordering, cycle detection, skip-if-valid
//! - `compositor`: the combine node's directive
//! - `dispatcher`: per-kind preconditions and service calls
//! - `FusionEngine`: the facade hosts talk to
//!
//! Model calls go through the `GenerationService` trait; the engine itself
//! never touches the network.
//!
//! # Example
//!
//! ```ignore
//! use fusion_engine::{FusionEngine, Node, NodeKind, PortId, BlendMode};
//!
//! let mut engine = FusionEngine::new(service);
//! engine.add_node(Node::text_source("a", "a red cube"))?;
//! engine.add_node(Node::new("b", NodeKind::Combine))?;
//! let edge = engine.connect("a", PortId::IMAGE, "b", PortId::Slot(0))?;
//! engine.set_combine_input("b", &edge, 0.6, BlendMode::AdditiveConcept)?;
//! let report = engine.run_from("b").await?;
//! ```

pub mod builder;
pub mod compositor;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod events;
pub mod graph;
pub mod invalidation;
pub mod ports;
pub mod scheduler;
pub mod service;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export key types
pub use builder::GraphBuilder;
pub use compositor::{compose, influence_descriptor, CompositePrompt};
pub use config::EngineConfig;
pub use dispatcher::has_valid_output;
pub use engine::FusionEngine;
pub use error::{EngineError, Result, ServiceError};
pub use events::{EngineEvent, EventError, EventSink, NullEventSink, VecEventSink};
pub use graph::Graph;
pub use invalidation::compute_downstream;
pub use ports::resolve_port_type;
pub use scheduler::{build_execution_order, NodeRunState, RunReport};
pub use service::{GenerationService, ServiceResult};
pub use types::*;
