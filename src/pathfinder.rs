use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::{Edge, EdgeId, Node, NodeId};

/// Shortest path: `nodes` from source to target, `edges[i]` joins `nodes[i]` and `nodes[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathResult {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
}

impl PathResult {
    /// Number of hops.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains(id)
    }

    pub fn contains_edge(&self, id: &EdgeId) -> bool {
        self.edges.contains(id)
    }
}

/// Unweighted shortest path between two nodes, following edges in both directions.
///
/// Only the given nodes and the edges between them are considered, so callers pass the
/// visible subgraph. Each adjacency list is ordered by `(neighbour id, edge id)`, which
/// makes the result the lexicographically smallest shortest path by neighbour id.
/// Returns `None` when either endpoint is missing or the target is unreachable.
pub fn find_path<'a>(
    nodes: impl IntoIterator<Item = &'a Node>,
    edges: impl IntoIterator<Item = &'a Edge>,
    source: &NodeId,
    target: &NodeId,
) -> Option<PathResult> {
    let mut adj: HashMap<&NodeId, Vec<(&NodeId, &EdgeId)>> =
        nodes.into_iter().map(|n| (n.id(), Vec::new())).collect();
    if !adj.contains_key(source) || !adj.contains_key(target) {
        return None;
    }
    if source == target {
        return Some(PathResult {
            nodes: vec![source.clone()],
            edges: Vec::new(),
        });
    }

    for e in edges {
        let (s, t) = (e.source(), e.target());
        if s == t || !adj.contains_key(s) || !adj.contains_key(t) {
            continue;
        }
        if let Some(list) = adj.get_mut(s) {
            list.push((t, e.id()));
        }
        if let Some(list) = adj.get_mut(t) {
            list.push((s, e.id()));
        }
    }
    for list in adj.values_mut() {
        list.sort_unstable();
    }

    let mut came_from: HashMap<&NodeId, (&NodeId, &EdgeId)> = HashMap::new();
    let mut queue = VecDeque::from([source]);
    'search: while let Some(v) = queue.pop_front() {
        for &(w, e) in adj.get(v).into_iter().flatten() {
            if w == source || came_from.contains_key(w) {
                continue;
            }
            came_from.insert(w, (v, e));
            if w == target {
                break 'search;
            }
            queue.push_back(w);
        }
    }

    let mut nodes = vec![target.clone()];
    let mut edges = Vec::new();
    let mut cur = target;
    while cur != source {
        let &(prev, e) = came_from.get(cur)?;
        nodes.push(prev.clone());
        edges.push(e.clone());
        cur = prev;
    }
    nodes.reverse();
    edges.reverse();
    Some(PathResult { nodes, edges })
}
