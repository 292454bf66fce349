use std::{
    collections::{BTreeSet, HashMap, HashSet, VecDeque},
    ops::Deref,
    sync::Arc,
};

use egui::{Pos2, Rect, Vec2};
use log::trace;
use petgraph::{
    stable_graph::{EdgeIndex, NodeIndex, StableGraph},
    visit::EdgeRef,
    Direction,
};
use serde::{Deserialize, Serialize};

use crate::{
    errors::GraphError,
    layouts::{LayoutEdge, LayoutNode, LayoutResult, LayoutSnapshot, NodePosition},
    pathfinder::{self, PathResult},
    Edge, EdgeId, EdgePatch, Node, NodeId, NodePatch, Selection,
};

/// Excludes nodes by display type. Filtered nodes stay in the model but are not visible.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    excluded_kinds: BTreeSet<String>,
}

impl Filter {
    pub fn excluding(kinds: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            excluded_kinds: kinds.into_iter().map(Into::into).collect(),
        }
    }

    pub fn exclude(&mut self, kind: impl Into<String>) {
        self.excluded_kinds.insert(kind.into());
    }

    pub fn include(&mut self, kind: &str) {
        self.excluded_kinds.remove(kind);
    }

    pub fn is_excluded(&self, kind: &str) -> bool {
        self.excluded_kinds.contains(kind)
    }

    pub fn is_empty(&self) -> bool {
        self.excluded_kinds.is_empty()
    }
}

/// Nodes and edges removed by a single [`Graph::remove_nodes`] call.
#[derive(Clone, Debug, Default)]
pub struct Removed {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Immutable view of the graph at one point in time.
///
/// Readers (renderer, minimap, path finding) hold an `Arc<GraphSnapshot>`; mutations on
/// [`Graph`] never touch a snapshot somebody else is holding.
#[derive(Clone, Debug, Default)]
pub struct GraphSnapshot {
    g: StableGraph<Node, Edge>,
    nodes_by_id: HashMap<NodeId, NodeIndex>,
    edges_by_id: HashMap<EdgeId, EdgeIndex>,

    selection: Selection,
    filter: Filter,
}

impl GraphSnapshot {
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes_by_id.get(id).map(|idx| &self.g[*idx])
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges_by_id.get(id).map(|idx| &self.g[*idx])
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes_by_id.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.g.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.g.edge_count()
    }

    pub fn nodes_iter(&self) -> impl Iterator<Item = &Node> {
        self.g.node_weights()
    }

    pub fn edges_iter(&self) -> impl Iterator<Item = &Edge> {
        self.g.edge_weights()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn is_node_visible(&self, n: &Node) -> bool {
        !n.hidden() && !self.filter.is_excluded(n.kind())
    }

    /// An edge is visible when it is not hidden and both endpoints are visible.
    pub fn is_edge_visible(&self, e: &Edge) -> bool {
        if e.hidden() {
            return false;
        }
        match (self.node(e.source()), self.node(e.target())) {
            (Some(s), Some(t)) => self.is_node_visible(s) && self.is_node_visible(t),
            _ => false,
        }
    }

    pub fn visible_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes_iter().filter(|n| self.is_node_visible(n))
    }

    pub fn visible_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges_iter().filter(|e| self.is_edge_visible(e))
    }

    pub fn edge_endpoints(&self, e: &Edge) -> Option<(&Node, &Node)> {
        Some((self.node(e.source())?, self.node(e.target())?))
    }

    /// Direct successors along outgoing edges, in edge enumeration order.
    pub fn children(&self, id: &NodeId) -> Vec<&NodeId> {
        let Some(idx) = self.nodes_by_id.get(id) else {
            return Vec::new();
        };
        self.g
            .neighbors_directed(*idx, Direction::Outgoing)
            .map(|n| self.g[n].id())
            .collect()
    }

    /// World-space bounding rect of all positioned visible nodes.
    pub fn bounds(&self) -> Option<Rect> {
        let mut res: Option<Rect> = None;
        for loc in self.visible_nodes().filter_map(Node::effective_location) {
            res = Some(match res {
                Some(r) => r.union(Rect::from_min_max(loc, loc)),
                None => Rect::from_min_max(loc, loc),
            });
        }
        res
    }

    /// Finds the topmost visible node whose circle of `radius(node)` contains `pos`.
    pub fn node_at(&self, pos: Pos2, radius: impl Fn(&Node) -> f32) -> Option<&NodeId> {
        self.visible_nodes()
            .filter_map(|n| {
                let loc = n.effective_location()?;
                let dist = loc.distance(pos);
                (dist <= radius(n)).then_some((dist, n.id()))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, id)| id)
    }

    /// Copies the visible subgraph for the layout worker.
    pub fn layout_snapshot(&self, node_size: Vec2) -> LayoutSnapshot {
        let nodes = self
            .visible_nodes()
            .map(|n| LayoutNode {
                id: n.id().clone(),
                location: n.location(),
                pinned: n.pinned(),
                size: node_size,
            })
            .collect();
        let edges = self
            .visible_edges()
            .map(|e| LayoutEdge {
                id: e.id().clone(),
                source: e.source().clone(),
                target: e.target().clone(),
            })
            .collect();
        LayoutSnapshot { nodes, edges }
    }

    /// Shortest path over the visible subgraph.
    pub fn find_path(&self, source: &NodeId, target: &NodeId) -> Option<PathResult> {
        pathfinder::find_path(self.visible_nodes(), self.visible_edges(), source, target)
    }

    fn index_of(&self, id: &NodeId) -> Result<NodeIndex, GraphError> {
        self.nodes_by_id
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::UnknownNode(id.clone()))
    }

    fn node_mut(&mut self, id: &NodeId) -> Result<&mut Node, GraphError> {
        let idx = self.index_of(id)?;
        Ok(&mut self.g[idx])
    }

    fn refresh_neighbor_count(&mut self, idx: NodeIndex) {
        let count = self
            .g
            .neighbors_undirected(idx)
            .filter(|n| *n != idx)
            .collect::<HashSet<_>>()
            .len();
        self.g[idx].set_neighbor_count(count);
    }

    /// Rederives `hidden` for every node and edge from the set of collapsed nodes.
    ///
    /// A node is hidden iff it is reachable over outgoing edges from some collapsed
    /// node other than itself. An edge is hidden iff either endpoint is hidden.
    fn recompute_hidden(&mut self) {
        let mut hidden = HashSet::new();
        let roots: Vec<NodeIndex> = self
            .g
            .node_indices()
            .filter(|idx| self.g[*idx].collapsed())
            .collect();

        for root in roots {
            let mut seen = HashSet::from([root]);
            let mut queue = VecDeque::from([root]);
            while let Some(idx) = queue.pop_front() {
                for next in self.g.neighbors_directed(idx, Direction::Outgoing) {
                    if seen.insert(next) {
                        hidden.insert(next);
                        queue.push_back(next);
                    }
                }
            }
        }

        let indices: Vec<NodeIndex> = self.g.node_indices().collect();
        for idx in indices {
            self.g[idx].set_hidden(hidden.contains(&idx));
        }
        let edges: Vec<EdgeIndex> = self.g.edge_indices().collect();
        for idx in edges {
            let Some((s, t)) = self.g.edge_endpoints(idx) else {
                continue;
            };
            let is_hidden = hidden.contains(&s) || hidden.contains(&t);
            self.g[idx].set_hidden(is_hidden);
        }
    }

    /// Updates hidden flags after `edge` was inserted.
    ///
    /// Reachability from a collapsed node changes only if the source is collapsed or
    /// already hidden; otherwise the edge just follows its target.
    fn rederive_hidden_after(&mut self, edge: EdgeIndex) {
        let Some((source, target)) = self.g.edge_endpoints(edge) else {
            return;
        };
        if self.g[source].collapsed() || self.g[source].hidden() {
            self.recompute_hidden();
        } else {
            let is_hidden = self.g[target].hidden();
            self.g[edge].set_hidden(is_hidden);
        }
    }
}

/// The canonical, mutable graph model.
///
/// Every mutation is synchronous and produces a new snapshot: if a reader still holds the
/// previous [`GraphSnapshot`], the state is copied before being changed.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    state: Arc<GraphSnapshot>,
}

impl Deref for Graph {
    type Target = GraphSnapshot;

    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from node and edge lists, failing on the first invalid element.
    pub fn from_elements(
        nodes: impl IntoIterator<Item = Node>,
        edges: impl IntoIterator<Item = Edge>,
    ) -> Result<Self, GraphError> {
        let mut g = Self::new();
        for n in nodes {
            g.add_node(n)?;
        }
        for e in edges {
            g.insert_edge(e)?;
        }
        g.mutate(GraphSnapshot::recompute_hidden);
        Ok(g)
    }

    /// Returns the current snapshot. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        Arc::clone(&self.state)
    }

    fn mutate<R>(&mut self, f: impl FnOnce(&mut GraphSnapshot) -> R) -> R {
        f(Arc::make_mut(&mut self.state))
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.contains_node(node.id()) {
            return Err(GraphError::DuplicateNode(node.id().clone()));
        }
        self.mutate(|s| {
            let mut node = node;
            node.set_neighbor_count(0);
            // no edges yet: nothing hides it and it hides nothing
            node.set_hidden(false);
            let id = node.id().clone();
            let idx = s.g.add_node(node);
            s.nodes_by_id.insert(id, idx);
        });
        Ok(())
    }

    /// Adds an edge. Both endpoints must already exist.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        let idx = self.insert_edge(edge)?;
        self.mutate(|s| s.rederive_hidden_after(idx));
        Ok(())
    }

    /// Validates and inserts an edge, leaving hidden flags to the caller.
    fn insert_edge(&mut self, edge: Edge) -> Result<EdgeIndex, GraphError> {
        if self.edges_by_id.contains_key(edge.id()) {
            return Err(GraphError::DuplicateEdge(edge.id().clone()));
        }
        for endpoint in [edge.source(), edge.target()] {
            if !self.contains_node(endpoint) {
                return Err(GraphError::DanglingEdge {
                    edge: edge.id().clone(),
                    missing: endpoint.clone(),
                });
            }
        }

        Ok(self.mutate(|s| {
            let source = s.nodes_by_id[edge.source()];
            let target = s.nodes_by_id[edge.target()];
            let id = edge.id().clone();
            let idx = s.g.add_edge(source, target, edge);
            s.edges_by_id.insert(id, idx);
            s.refresh_neighbor_count(source);
            s.refresh_neighbor_count(target);
            s.g[idx].set_hidden(false);
            idx
        }))
    }

    /// Removes nodes and, in the same update, every edge referencing them.
    /// Unknown ids are ignored.
    pub fn remove_nodes(&mut self, ids: &[NodeId]) -> Removed {
        let targets: Vec<NodeIndex> = ids
            .iter()
            .filter_map(|id| self.nodes_by_id.get(id).copied())
            .collect();
        if targets.is_empty() {
            return Removed::default();
        }

        self.mutate(|s| {
            let removed_set: HashSet<NodeIndex> = targets.iter().copied().collect();
            let mut edge_indices = HashSet::new();
            let mut touched = HashSet::new();
            for idx in &targets {
                for dir in [Direction::Outgoing, Direction::Incoming] {
                    for e in s.g.edges_directed(*idx, dir) {
                        edge_indices.insert(e.id());
                        touched.insert(e.source());
                        touched.insert(e.target());
                    }
                }
            }

            let mut res = Removed::default();
            for idx in edge_indices {
                if let Some(e) = s.g.remove_edge(idx) {
                    s.edges_by_id.remove(e.id());
                    res.edges.push(e);
                }
            }
            for idx in targets {
                if let Some(n) = s.g.remove_node(idx) {
                    s.nodes_by_id.remove(n.id());
                    res.nodes.push(n);
                }
            }

            for idx in touched.difference(&removed_set) {
                s.refresh_neighbor_count(*idx);
            }
            let nodes_by_id = &s.nodes_by_id;
            s.selection.retain(|id| nodes_by_id.contains_key(id));
            s.recompute_hidden();
            res
        })
    }

    /// Removes edges by id. Unknown ids are ignored.
    pub fn remove_edges(&mut self, ids: &[EdgeId]) -> Vec<Edge> {
        let targets: Vec<EdgeIndex> = ids
            .iter()
            .filter_map(|id| self.edges_by_id.get(id).copied())
            .collect();
        if targets.is_empty() {
            return Vec::new();
        }

        self.mutate(|s| {
            let mut res = Vec::with_capacity(targets.len());
            let mut touched = HashSet::new();
            for idx in targets {
                if let Some((a, b)) = s.g.edge_endpoints(idx) {
                    touched.insert(a);
                    touched.insert(b);
                }
                if let Some(e) = s.g.remove_edge(idx) {
                    s.edges_by_id.remove(e.id());
                    res.push(e);
                }
            }
            for idx in touched {
                s.refresh_neighbor_count(idx);
            }
            s.recompute_hidden();
            res
        })
    }

    pub fn update_node(&mut self, id: &NodeId, patch: NodePatch) -> Result<(), GraphError> {
        self.index_of(id)?;
        self.mutate(|s| s.node_mut(id).map(|n| n.apply(patch)))
    }

    pub fn update_edge(&mut self, id: &EdgeId, patch: EdgePatch) -> Result<(), GraphError> {
        let idx = self
            .edges_by_id
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::UnknownEdge(id.clone()))?;
        self.mutate(|s| s.g[idx].apply(patch));
        Ok(())
    }

    /// Replaces the selection. Ids that do not exist are dropped.
    pub fn set_selection(
        &mut self,
        current: Option<NodeId>,
        selected: impl IntoIterator<Item = NodeId>,
    ) {
        let selected: Vec<NodeId> = selected
            .into_iter()
            .filter(|id| self.contains_node(id))
            .collect();
        let current = current.filter(|id| self.contains_node(id));
        self.mutate(|s| s.selection = Selection::new(current, selected));
    }

    /// Click-to-toggle selection, see [`Selection::toggle`].
    pub fn toggle_selection(&mut self, id: &NodeId, multi: bool) -> Result<(), GraphError> {
        self.index_of(id)?;
        self.mutate(|s| s.selection.toggle(id, multi));
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        if self.selection.is_empty() {
            return;
        }
        self.mutate(|s| s.selection.clear());
    }

    /// Collapses or expands the subtree reachable from `id` over outgoing edges.
    /// Returns the new collapsed state.
    pub fn toggle_collapse(&mut self, id: &NodeId) -> Result<bool, GraphError> {
        let idx = self.index_of(id)?;
        Ok(self.mutate(|s| {
            let collapsed = !s.g[idx].collapsed();
            s.g[idx].set_collapsed(collapsed);
            s.recompute_hidden();
            collapsed
        }))
    }

    pub fn set_filter(&mut self, filter: Filter) {
        if self.filter == filter {
            return;
        }
        self.mutate(|s| s.filter = filter);
    }

    /// Moves a node, e.g. while the user drags it. A pinned node stays pinned at the
    /// new position.
    pub fn move_node(&mut self, id: &NodeId, pos: Pos2) -> Result<(), GraphError> {
        self.index_of(id)?;
        self.mutate(|s| {
            s.node_mut(id).map(|n| {
                n.set_location(pos);
                if n.pinned().is_some() {
                    n.set_pinned(Some(pos));
                }
            })
        })
    }

    /// Pins a node at its current position. Returns false if it was never laid out.
    pub fn pin_node(&mut self, id: &NodeId) -> Result<bool, GraphError> {
        let Some(loc) = self.node(id).map(Node::effective_location) else {
            return Err(GraphError::UnknownNode(id.clone()));
        };
        let Some(loc) = loc else {
            return Ok(false);
        };
        self.mutate(|s| s.node_mut(id).map(|n| n.set_pinned(Some(loc))))?;
        Ok(true)
    }

    pub fn unpin_node(&mut self, id: &NodeId) -> Result<(), GraphError> {
        self.index_of(id)?;
        self.mutate(|s| {
            s.node_mut(id).map(|n| {
                if let Some(p) = n.pinned() {
                    n.set_location(p);
                }
                n.set_pinned(None);
            })
        })
    }

    /// Releases every pin so the next force layout moves all nodes.
    pub fn unpin_all(&mut self) {
        self.mutate(|s| {
            for n in s.g.node_weights_mut() {
                if let Some(p) = n.pinned() {
                    n.set_location(p);
                }
                n.set_pinned(None);
            }
        });
    }

    /// Merges layout output by id. Entries for nodes that no longer exist are dropped.
    /// Returns the number of merged positions.
    pub fn merge_layout(&mut self, result: &LayoutResult) -> usize {
        self.merge_positions(&result.positions)
    }

    /// Merges a batch of positions, e.g. from [`crate::LayoutMessage::Progress`], by id.
    /// Location and pin are written as given; unknown ids are dropped.
    pub fn merge_positions(&mut self, positions: &[NodePosition]) -> usize {
        self.mutate(|s| {
            let mut merged = 0;
            for p in positions {
                let Some(idx) = s.nodes_by_id.get(&p.id).copied() else {
                    trace!("dropping stale layout position for node {}", p.id);
                    continue;
                };
                let n = &mut s.g[idx];
                n.set_location(p.location);
                n.set_pinned(p.pinned);
                merged += 1;
            }
            merged
        })
    }
}
