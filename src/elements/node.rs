use egui::Pos2;
use serde::{Deserialize, Serialize};

use super::{NodeId, Properties};

/// Stores properties of a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    id: NodeId,

    /// World position. `None` until the node is laid out for the first time.
    location: Option<Pos2>,
    /// Fixed position overriding the simulation (`fx`, `fy`).
    pinned: Option<Pos2>,

    /// Display type, drives color, icon and size through the style lookup.
    kind: String,
    label: String,

    #[serde(default)]
    neighbor_count: usize,
    #[serde(default)]
    collapsed: bool,
    #[serde(default)]
    hidden: bool,

    #[serde(default)]
    properties: Properties,
}

/// Partial update applied by [`crate::Graph::update_node`]. `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    pub label: Option<String>,
    pub kind: Option<String>,
    pub location: Option<Pos2>,
    /// `Some(None)` unpins the node.
    pub pinned: Option<Option<Pos2>>,
    pub properties: Option<Properties>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: None,
            pinned: None,
            kind: kind.into(),
            label: String::default(),
            neighbor_count: 0,
            collapsed: false,
            hidden: false,
            properties: Properties::default(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_location(mut self, location: Pos2) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_pinned(mut self, pinned: Pos2) -> Self {
        self.pinned = Some(pinned);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn location(&self) -> Option<Pos2> {
        self.location
    }

    /// Position used for drawing: the pin wins over the simulated location.
    pub fn effective_location(&self) -> Option<Pos2> {
        self.pinned.or(self.location)
    }

    pub fn set_location(&mut self, location: Pos2) {
        self.location = Some(location);
    }

    pub fn pinned(&self) -> Option<Pos2> {
        self.pinned
    }

    pub fn set_pinned(&mut self, pinned: Option<Pos2>) {
        self.pinned = pinned;
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbor_count
    }

    pub(crate) fn set_neighbor_count(&mut self, count: usize) {
        self.neighbor_count = count;
    }

    pub fn collapsed(&self) -> bool {
        self.collapsed
    }

    pub(crate) fn set_collapsed(&mut self, collapsed: bool) {
        self.collapsed = collapsed;
    }

    /// True iff the node is a strict descendant of a collapsed node.
    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub(crate) fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub(crate) fn apply(&mut self, patch: NodePatch) {
        if let Some(label) = patch.label {
            self.label = label;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(location) = patch.location {
            self.location = Some(location);
        }
        if let Some(pinned) = patch.pinned {
            self.pinned = pinned;
        }
        if let Some(properties) = patch.properties {
            self.properties = properties;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_overrides_location() {
        let mut n = Node::new("a", "person").with_location(Pos2::new(1.0, 2.0));
        assert_eq!(n.effective_location(), Some(Pos2::new(1.0, 2.0)));
        n.set_pinned(Some(Pos2::new(5.0, 5.0)));
        assert_eq!(n.effective_location(), Some(Pos2::new(5.0, 5.0)));
    }

    #[test]
    fn patch_touches_only_given_fields() {
        let mut n = Node::new("a", "person")
            .with_label("Alice")
            .with_pinned(Pos2::new(3.0, 3.0));
        n.apply(NodePatch {
            kind: Some("email".to_string()),
            pinned: Some(None),
            ..Default::default()
        });
        assert_eq!(n.label(), "Alice");
        assert_eq!(n.kind(), "email");
        assert_eq!(n.pinned(), None);
    }

    #[test]
    fn properties_survive_json() {
        let n = Node::new("a", "domain").with_property("tld", serde_json::json!("org"));
        let json = serde_json::to_string(&n).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back.properties().get("tld"), Some(&serde_json::json!("org")));
    }
}
