//! Event types for streaming run progress
//!
//! Events are sent from the engine to the presentation layer (or any
//! consumer) to report run progress, node state changes and invalidation.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::types::NodeId;

/// Trait for sending engine events
///
/// This abstracts over the transport mechanism (IPC channel, mpsc, etc.)
/// allowing the engine to be used in different contexts.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be sent (e.g., channel closed)
    fn send(&self, event: EngineEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone, thiserror::Error)]
#[error("Event error: {message}")]
pub struct EventError {
    pub message: String,
}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Events emitted while editing and running a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// A run was scheduled; `queue` is the execution order
    #[serde(rename_all = "camelCase")]
    RunStarted {
        execution_id: String,
        target: NodeId,
        queue: Vec<NodeId>,
    },

    /// A run finished without failures
    #[serde(rename_all = "camelCase")]
    RunCompleted {
        execution_id: String,
        target: NodeId,
        executed: usize,
        skipped: usize,
    },

    /// A run was halted or never started
    #[serde(rename_all = "camelCase")]
    RunFailed {
        execution_id: String,
        target: NodeId,
        error: String,
    },

    /// A queued node was not executed
    #[serde(rename_all = "camelCase")]
    NodeSkipped {
        execution_id: String,
        node_id: NodeId,
    },

    /// A node started executing
    #[serde(rename_all = "camelCase")]
    NodeStarted {
        execution_id: String,
        node_id: NodeId,
    },

    /// A node wrote its output
    #[serde(rename_all = "camelCase")]
    NodeCompleted {
        execution_id: String,
        node_id: NodeId,
    },

    /// A node failed; the message is also recorded on the node
    #[serde(rename_all = "camelCase")]
    NodeFailed {
        execution_id: String,
        node_id: NodeId,
        error: String,
    },

    /// Cached outputs were cleared after a source edit
    #[serde(rename_all = "camelCase")]
    OutputsInvalidated { origin: NodeId, cleared: Vec<NodeId> },

    /// An expired failure message was removed from a node
    #[serde(rename_all = "camelCase")]
    ErrorCleared { node_id: NodeId },
}

impl EngineEvent {
    /// Create a node skipped event
    pub fn node_skipped(execution_id: &str, node_id: &str) -> Self {
        Self::NodeSkipped {
            execution_id: execution_id.to_string(),
            node_id: node_id.to_string(),
        }
    }

    /// Create a node started event
    pub fn node_started(execution_id: &str, node_id: &str) -> Self {
        Self::NodeStarted {
            execution_id: execution_id.to_string(),
            node_id: node_id.to_string(),
        }
    }

    pub fn node_completed(execution_id: &str, node_id: &str) -> Self {
        Self::NodeCompleted {
            execution_id: execution_id.to_string(),
            node_id: node_id.to_string(),
        }
    }

    pub fn node_failed(execution_id: &str, node_id: &str, error: impl Into<String>) -> Self {
        Self::NodeFailed {
            execution_id: execution_id.to_string(),
            node_id: node_id.to_string(),
            error: error.into(),
        }
    }
}

/// A no-op event sink that discards all events
///
/// Useful for testing or when events aren't needed.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: EngineEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EngineEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<EngineEvent> {
        self.lock().clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: EngineEvent) -> Result<(), EventError> {
        self.lock().push(event);
        Ok(())
    }
}

/// Send an event, logging instead of failing when the sink is gone
pub(crate) fn emit(sink: &dyn EventSink, event: EngineEvent) {
    if let Err(e) = sink.send(event) {
        log::warn!("Dropping engine event: {}", e);
    }
}
