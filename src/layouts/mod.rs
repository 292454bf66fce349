mod force_directed;
mod hierarchical;
mod worker;

use std::{collections::HashSet, fmt, str::FromStr};

use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};

use crate::{errors::LayoutError, EdgeId, NodeId};

pub use force_directed::ForceSimulation;
pub use hierarchical::{Hierarchical, Orientation};
pub use worker::{LayoutEngine, LayoutMessage};

/// Graphs above this node count are too slow for the hierarchical layout.
/// Callers guard with it; the engine does not enforce it.
pub const HIERARCHICAL_NODE_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayoutAlgorithm {
    Force,
    Hierarchical,
}

impl FromStr for LayoutAlgorithm {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "force" => Ok(Self::Force),
            "dag" | "hierarchical" => Ok(Self::Hierarchical),
            other => Err(LayoutError::UnknownAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for LayoutAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Force => write!(f, "force"),
            Self::Hierarchical => write!(f, "hierarchical"),
        }
    }
}

/// Monotonic id of a layout request. Later requests supersede earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub(crate) u64);

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub id: NodeId,
    pub location: Option<Pos2>,
    pub pinned: Option<Pos2>,
    pub size: Vec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
}

/// Owned copy of the graph handed to the layout worker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutSnapshot {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
}

impl LayoutSnapshot {
    /// Rejects snapshots the algorithms cannot work with.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let mut ids = HashSet::with_capacity(self.nodes.len());
        for n in &self.nodes {
            if !ids.insert(&n.id) {
                return Err(LayoutError::DuplicateNode(n.id.clone()));
            }
            let finite = |p: Option<Pos2>| p.is_none_or(|p| p.x.is_finite() && p.y.is_finite());
            if !finite(n.location) || !finite(n.pinned) {
                return Err(LayoutError::NonFinitePosition(n.id.clone()));
            }
        }
        for e in &self.edges {
            for endpoint in [&e.source, &e.target] {
                if !ids.contains(endpoint) {
                    return Err(LayoutError::DanglingEdge {
                        edge: e.id.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Everything an algorithm needs besides the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutOptions {
    pub settings: crate::SettingsSimulation,

    /// World-space area new nodes are scattered in and the force layout centres on.
    pub viewport: Rect,

    pub orientation: Orientation,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            settings: crate::SettingsSimulation::default(),
            viewport: Rect::from_center_size(Pos2::ZERO, Vec2::splat(800.0)),
            orientation: Orientation::default(),
        }
    }
}

impl LayoutOptions {
    /// Rejects viewports with non-finite corners or `min > max` on either axis.
    pub fn validate(&self) -> Result<(), LayoutError> {
        validate_viewport(self.viewport)
    }
}

pub(crate) fn validate_viewport(v: Rect) -> Result<(), LayoutError> {
    if v.is_finite() && v.min.x <= v.max.x && v.min.y <= v.max.y {
        Ok(())
    } else {
        Err(LayoutError::InvalidViewport(v))
    }
}

/// Position of one node in a layout result. `pinned` is written back verbatim,
/// `None` releases any pin.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePosition {
    pub id: NodeId,
    pub location: Pos2,
    pub pinned: Option<Pos2>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutResult {
    pub algorithm: LayoutAlgorithm,
    pub positions: Vec<NodePosition>,
}
