use serde::{Deserialize, Serialize};

use super::{EdgeId, NodeId, Properties};

/// Stores properties of an edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    id: EdgeId,
    source: NodeId,
    target: NodeId,

    label: Option<String>,

    /// Mirrors endpoint visibility, derived by the graph.
    #[serde(default)]
    hidden: bool,

    #[serde(default)]
    properties: Properties,
}

/// Partial update applied by [`crate::Graph::update_edge`]. Endpoints are immutable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgePatch {
    /// `Some(None)` removes the label.
    pub label: Option<Option<String>>,
    pub properties: Option<Properties>,
}

impl Edge {
    pub fn new(id: impl Into<EdgeId>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            label: None,
            hidden: false,
            properties: Properties::default(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn id(&self) -> &EdgeId {
        &self.id
    }

    pub fn source(&self) -> &NodeId {
        &self.source
    }

    pub fn target(&self) -> &NodeId {
        &self.target
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub(crate) fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub(crate) fn apply(&mut self, patch: EdgePatch) {
        if let Some(label) = patch.label {
            self.label = label;
        }
        if let Some(properties) = patch.properties {
            self.properties = properties;
        }
    }
}
