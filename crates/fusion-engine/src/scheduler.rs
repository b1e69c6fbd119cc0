//! Execution scheduling
//!
//! A run walks backward from its target to collect every upstream node, then
//! executes them one at a time in dependency order. Nodes that already hold a
//! valid output are skipped (except the target, which always re-runs), so a
//! second run of an unchanged graph makes no service calls. The first failure
//! halts the run.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::dispatcher::{self, has_valid_output, is_computing, keeps_output_while_running};
use crate::error::{EngineError, Result};
use crate::events::{emit, EngineEvent, EventSink};
use crate::graph::Graph;
use crate::service::GenerationService;
use crate::types::{NodeId, NodeUpdate};

/// Lifecycle of a node within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRunState {
    Pending,
    Running,
    Done,
    Failed,
    Skipped,
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub execution_id: String,
    pub target: NodeId,
    /// Execution order, dependencies first, target last
    pub order: Vec<NodeId>,
    /// Final state of every queued node
    pub states: HashMap<NodeId, NodeRunState>,
    /// Nodes that called the service (or resolved immediately), in order
    pub executed: Vec<NodeId>,
    /// Nodes that were queued but not executed, in order
    pub skipped: Vec<NodeId>,
}

/// Order the target and everything upstream of it for execution
///
/// Depth-first over incoming edges; the post-order is the execution order.
/// Any cycle reachable upstream aborts with `CycleDetected` attributed to the
/// target.
pub fn build_execution_order(graph: &Graph, target: &str) -> Result<Vec<NodeId>> {
    graph.node(target)?;

    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut visiting = HashSet::new();
    visit(graph, target, &mut visiting, &mut visited, &mut order).map_err(|_| {
        EngineError::CycleDetected {
            node_id: target.to_string(),
        }
    })?;
    Ok(order)
}

/// Marker for a back edge found during the walk
struct Cycle;

fn visit(
    graph: &Graph,
    node_id: &str,
    visiting: &mut HashSet<NodeId>,
    visited: &mut HashSet<NodeId>,
    order: &mut Vec<NodeId>,
) -> std::result::Result<(), Cycle> {
    if visited.contains(node_id) {
        return Ok(());
    }
    if !visiting.insert(node_id.to_string()) {
        return Err(Cycle);
    }

    for dependency in graph.get_dependencies(node_id) {
        visit(graph, &dependency, visiting, visited, order)?;
    }

    visiting.remove(node_id);
    visited.insert(node_id.to_string());
    order.push(node_id.to_string());
    Ok(())
}

/// Run `target` and its stale dependencies, writing outputs into `graph`
pub(crate) async fn execute(
    graph: &mut Graph,
    target: &str,
    service: &dyn GenerationService,
    config: &EngineConfig,
    events: &dyn EventSink,
) -> Result<RunReport> {
    let execution_id = uuid::Uuid::new_v4().to_string();

    let order = match build_execution_order(graph, target) {
        Ok(order) => order,
        Err(err) => {
            if matches!(err, EngineError::CycleDetected { .. }) {
                graph.update_node(target, NodeUpdate::new().error(Some(err.to_string())))?;
            }
            log::warn!("Run of '{}' rejected: {}", target, err);
            emit(
                events,
                EngineEvent::RunFailed {
                    execution_id,
                    target: target.to_string(),
                    error: err.to_string(),
                },
            );
            return Err(err);
        }
    };

    log::info!("Running '{}' ({} queued)", target, order.len());
    log::debug!("Execution order: {:?}", order);
    emit(
        events,
        EngineEvent::RunStarted {
            execution_id: execution_id.clone(),
            target: target.to_string(),
            queue: order.clone(),
        },
    );

    let mut report = RunReport {
        execution_id: execution_id.clone(),
        target: target.to_string(),
        states: order
            .iter()
            .map(|id| (id.clone(), NodeRunState::Pending))
            .collect(),
        order: order.clone(),
        executed: Vec::new(),
        skipped: Vec::new(),
    };

    for node_id in &order {
        let node = graph.node(node_id)?;
        let kind = node.kind();

        let reusable = node_id != target && has_valid_output(node);
        if reusable || !is_computing(kind) {
            log::debug!("Skipping '{}' ({})", node_id, kind);
            report.states.insert(node_id.clone(), NodeRunState::Skipped);
            report.skipped.push(node_id.clone());
            emit(events, EngineEvent::node_skipped(&execution_id, node_id));
            continue;
        }

        let mut start = NodeUpdate::new().processing(true).error(None);
        if !keeps_output_while_running(kind) {
            start = start.output(None);
        }
        graph.update_node(node_id, start)?;
        report.states.insert(node_id.clone(), NodeRunState::Running);
        emit(events, EngineEvent::node_started(&execution_id, node_id));

        let result = match dispatcher::prepare(graph, node_id, config) {
            Ok(call) => {
                log::debug!("Node '{}' calling {}", node_id, call.operation());
                dispatcher::invoke(call, service).await
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(output) => {
                graph.update_node(
                    node_id,
                    NodeUpdate::new().processing(false).output(Some(output)),
                )?;
                report.states.insert(node_id.clone(), NodeRunState::Done);
                report.executed.push(node_id.clone());
                log::debug!("Node '{}' completed", node_id);
                emit(events, EngineEvent::node_completed(&execution_id, node_id));
            }
            Err(err) => {
                let message = err.to_string();
                graph.update_node(
                    node_id,
                    NodeUpdate::new()
                        .processing(false)
                        .error(Some(message.clone())),
                )?;
                report.states.insert(node_id.clone(), NodeRunState::Failed);
                log::warn!("Node '{}' failed: {}", node_id, message);
                emit(
                    events,
                    EngineEvent::node_failed(&execution_id, node_id, message.clone()),
                );
                emit(
                    events,
                    EngineEvent::RunFailed {
                        execution_id: execution_id.clone(),
                        target: target.to_string(),
                        error: message,
                    },
                );
                return Err(EngineError::node_failed(node_id.clone(), err));
            }
        }
    }

    log::info!(
        "Run of '{}' finished: {} executed, {} skipped",
        target,
        report.executed.len(),
        report.skipped.len()
    );
    emit(
        events,
        EngineEvent::RunCompleted {
            execution_id,
            target: target.to_string(),
            executed: report.executed.len(),
            skipped: report.skipped.len(),
        },
    );
    Ok(report)
}
