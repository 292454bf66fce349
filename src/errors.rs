use std::fmt;

use crate::{EdgeId, NodeId};

/// Errors returned by [`crate::Graph`] mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    DuplicateNode(NodeId),
    DuplicateEdge(EdgeId),
    UnknownNode(NodeId),
    UnknownEdge(EdgeId),
    /// Edge endpoint does not resolve to an existing node.
    DanglingEdge { edge: EdgeId, missing: NodeId },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateNode(id) => write!(f, "node {id} already exists"),
            Self::DuplicateEdge(id) => write!(f, "edge {id} already exists"),
            Self::UnknownNode(id) => write!(f, "node {id} does not exist"),
            Self::UnknownEdge(id) => write!(f, "edge {id} does not exist"),
            Self::DanglingEdge { edge, missing } => {
                write!(f, "edge {edge} references missing node {missing}")
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Terminal failure of a layout request. Delivered as a message, never a panic.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutError {
    UnknownAlgorithm(String),
    DuplicateNode(NodeId),
    DanglingEdge { edge: EdgeId, missing: NodeId },
    NonFinitePosition(NodeId),
    /// Viewport with non-finite corners or `min > max`.
    InvalidViewport(egui::Rect),
    /// The algorithm panicked; the worker survives and keeps serving requests.
    Panicked(String),
    /// The worker thread is gone, the request could not be delivered.
    WorkerUnavailable,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAlgorithm(name) => write!(f, "unknown layout algorithm '{name}'"),
            Self::DuplicateNode(id) => write!(f, "snapshot contains node {id} twice"),
            Self::DanglingEdge { edge, missing } => {
                write!(f, "snapshot edge {edge} references missing node {missing}")
            }
            Self::NonFinitePosition(id) => write!(f, "node {id} has a non-finite position"),
            Self::InvalidViewport(rect) => write!(f, "invalid layout viewport {rect:?}"),
            Self::Panicked(reason) => write!(f, "layout panicked: {reason}"),
            Self::WorkerUnavailable => write!(f, "layout worker is not running"),
        }
    }
}

impl std::error::Error for LayoutError {}

/// Per-key icon load failure. Cloneable so it can travel through a shared future.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconError {
    Fetch { key: String, reason: String },
    Decode { key: String, reason: String },
    /// Decoded pixel buffer does not match its declared size.
    Corrupt { key: String },
}

impl fmt::Display for IconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch { key, reason } => write!(f, "failed to fetch icon '{key}': {reason}"),
            Self::Decode { key, reason } => write!(f, "failed to decode icon '{key}': {reason}"),
            Self::Corrupt { key } => write!(f, "icon '{key}' has a corrupt pixel buffer"),
        }
    }
}

impl std::error::Error for IconError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dangling_edge_message_names_both_ids() {
        let err = GraphError::DanglingEdge {
            edge: EdgeId::from("e1"),
            missing: NodeId::from("ghost"),
        };
        assert_eq!(err.to_string(), "edge e1 references missing node ghost");
    }

    #[test]
    fn unknown_algorithm_message() {
        let err = LayoutError::UnknownAlgorithm("elk".to_string());
        assert_eq!(err.to_string(), "unknown layout algorithm 'elk'");
    }
}
