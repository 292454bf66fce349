use std::collections::HashSet;

use crate::{pathfinder::PathResult, EdgeId, NodeId, Selection};

/// Nodes and edges drawn on top at full opacity. When non-empty, everything else is dimmed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Highlight {
    nodes: HashSet<NodeId>,
    edges: HashSet<EdgeId>,
}

impl Highlight {
    pub fn with_selection(mut self, selection: &Selection) -> Self {
        self.nodes.extend(selection.selected().iter().cloned());
        self
    }

    pub fn with_path(mut self, path: &PathResult) -> Self {
        self.nodes.extend(path.nodes.iter().cloned());
        self.edges.extend(path.edges.iter().cloned());
        self
    }

    pub fn with_node(mut self, id: NodeId) -> Self {
        self.nodes.insert(id);
        self
    }

    pub fn with_edge(mut self, id: EdgeId) -> Self {
        self.edges.insert(id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains(id)
    }

    pub fn contains_edge(&self, id: &EdgeId) -> bool {
        self.edges.contains(id)
    }
}
