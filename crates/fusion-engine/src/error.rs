//! Error types for the fusion engine

use thiserror::Error;

use crate::types::{NodeId, NodeKind, PortId};

/// Result type alias using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur in the fusion engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The dependency set of a run target contains a cycle
    #[error("Cycle detected in the node graph; cannot run node '{node_id}'")]
    CycleDetected { node_id: NodeId },

    /// A required input has no connected or valid upstream data
    #[error("{0}")]
    MissingInput(String),

    /// A node-specific precondition is unmet
    #[error("{0}")]
    InvalidConfiguration(String),

    /// The generation service rejected or failed the call (message is verbatim)
    #[error("{0}")]
    ServiceFailure(String),

    /// Port types do not match, or the port does not exist
    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    /// The target input port already has an edge
    #[error("Input port '{port}' on node '{node_id}' is already connected")]
    PortOccupied { node_id: NodeId, port: PortId },

    /// Node lookup failed
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Edge lookup failed
    #[error("Edge not found: {0}")]
    EdgeNotFound(String),

    /// A node with this ID already exists
    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    /// The node kind has no generation behavior
    #[error("Node kind '{0}' cannot be executed")]
    NotExecutable(NodeKind),

    /// A node failed during a run
    #[error("Node '{node_id}' failed: {source}")]
    NodeFailed {
        node_id: NodeId,
        #[source]
        source: Box<EngineError>,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Create a missing input error with a message
    pub fn missing(msg: impl Into<String>) -> Self {
        Self::MissingInput(msg.into())
    }

    /// Create an invalid configuration error with a message
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Wrap an execution error with the node that raised it
    pub fn node_failed(node_id: impl Into<NodeId>, source: EngineError) -> Self {
        Self::NodeFailed {
            node_id: node_id.into(),
            source: Box::new(source),
        }
    }

    /// The innermost error, unwrapping `NodeFailed`
    pub fn root(&self) -> &EngineError {
        match self {
            Self::NodeFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// The message shown on the node that raised this error
    pub fn node_message(&self) -> String {
        self.root().to_string()
    }
}

/// Error returned by a generation service implementation
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub message: String,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<ServiceError> for EngineError {
    fn from(err: ServiceError) -> Self {
        Self::ServiceFailure(err.message)
    }
}
