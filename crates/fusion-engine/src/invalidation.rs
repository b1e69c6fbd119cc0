//! Downstream invalidation
//!
//! When a source node's authored data changes, every node that can reach it
//! through forward edges holds a stale output. These functions compute that
//! set and clear it.

use std::collections::{BTreeSet, HashSet, VecDeque};

use crate::graph::Graph;
use crate::types::NodeId;

/// Every node reachable from `node_id` along outgoing edges
///
/// Breadth-first with a visited set, so diamonds and cycles terminate. The
/// start node is only included when a cycle leads back to it.
pub fn compute_downstream(graph: &Graph, node_id: &str) -> BTreeSet<NodeId> {
    let mut downstream = BTreeSet::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();

    visited.insert(node_id);
    queue.push_back(node_id);

    while let Some(current) = queue.pop_front() {
        for edge in graph.outgoing_edges(current) {
            let target = edge.target.as_str();
            if target == node_id {
                downstream.insert(target.to_string());
            }
            if visited.insert(target) {
                downstream.insert(target.to_string());
                queue.push_back(target);
            }
        }
    }

    downstream
}

/// Clear the cached outputs of everything downstream of `node_id`
///
/// Configuration and instructions are left alone. Returns the cleared set.
pub fn invalidate_downstream(graph: &mut Graph, node_id: &str) -> BTreeSet<NodeId> {
    let downstream = compute_downstream(graph, node_id);
    graph.clear_outputs(&downstream);
    log::debug!(
        "Invalidated {} node(s) downstream of '{}'",
        downstream.len(),
        node_id
    );
    downstream
}
