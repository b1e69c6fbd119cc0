//! Port type resolution
//!
//! A single exhaustive table maps `(kind, port, direction)` to the semantic
//! type of the port. Connection validation and the prompt compositor both
//! classify ports through this table, so adding a kind forces a decision here.

use crate::error::{EngineError, Result};
use crate::types::{NodeKind, PortDataType, PortDirection, PortId};

/// Resolve the semantic type of a port, or `None` if the port does not exist
pub fn resolve_port_type(
    kind: NodeKind,
    port: PortId,
    direction: PortDirection,
) -> Option<PortDataType> {
    use PortDataType::{Image, Text};

    match direction {
        PortDirection::Output => match kind {
            NodeKind::StyleExtractor | NodeKind::EnhanceText => Some(Text),
            NodeKind::Analyze | NodeKind::TextSource => match port {
                PortId::Text => Some(Text),
                PortId::Slot(0) => Some(Image),
                _ => None,
            },
            NodeKind::RawImage
            | NodeKind::Combine
            | NodeKind::SceneCompose
            | NodeKind::DetailRefine => match port {
                PortId::Slot(0) => Some(Image),
                _ => None,
            },
        },
        PortDirection::Input => match kind {
            NodeKind::Combine => match port {
                PortId::Prompt => Some(Text),
                PortId::Slot(_) => Some(Image),
                PortId::Text => None,
            },
            NodeKind::EnhanceText => match port {
                PortId::Text => Some(Text),
                _ => None,
            },
            NodeKind::Analyze
            | NodeKind::StyleExtractor
            | NodeKind::SceneCompose
            | NodeKind::DetailRefine => match port {
                PortId::Slot(_) => Some(Image),
                _ => None,
            },
            NodeKind::RawImage | NodeKind::TextSource => None,
        },
    }
}

/// Check that an output port may feed an input port
///
/// Returns the shared port type on success.
pub fn check_connection(
    source_kind: NodeKind,
    source_port: PortId,
    target_kind: NodeKind,
    target_port: PortId,
) -> Result<PortDataType> {
    let from = resolve_port_type(source_kind, source_port, PortDirection::Output).ok_or_else(|| {
        EngineError::InvalidConnection(format!(
            "{} has no output port '{}'",
            source_kind, source_port
        ))
    })?;
    let to = resolve_port_type(target_kind, target_port, PortDirection::Input).ok_or_else(|| {
        EngineError::InvalidConnection(format!(
            "{} has no input port '{}'",
            target_kind, target_port
        ))
    })?;

    if from != to {
        return Err(EngineError::InvalidConnection(format!(
            "cannot connect {:?} output to {:?} input",
            from, to
        )));
    }
    Ok(from)
}
