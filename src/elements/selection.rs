use serde::{Deserialize, Serialize};

use super::NodeId;

/// Current node plus the selected set.
///
/// `current`, when set, is always a member of `selected`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    current: Option<NodeId>,
    selected: Vec<NodeId>,
}

impl Selection {
    /// Builds a selection, adding `current` to the set if it is missing.
    pub fn new(current: Option<NodeId>, selected: impl IntoIterator<Item = NodeId>) -> Self {
        let mut res = Self::default();
        for id in selected {
            if !res.selected.contains(&id) {
                res.selected.push(id);
            }
        }
        if let Some(current) = current {
            if !res.selected.contains(&current) {
                res.selected.push(current.clone());
            }
            res.current = Some(current);
        }
        res
    }

    pub fn current(&self) -> Option<&NodeId> {
        self.current.as_ref()
    }

    pub fn selected(&self) -> &[NodeId] {
        &self.selected
    }

    pub fn is_selected(&self, id: &NodeId) -> bool {
        self.selected.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.selected.clear();
    }

    /// Click semantics.
    ///
    /// Multi: toggles membership; an added node becomes current.
    /// Single: replaces the selection with `id`, unless `id` already is the sole
    /// selection, in which case the selection is cleared.
    pub fn toggle(&mut self, id: &NodeId, multi: bool) {
        if multi {
            if let Some(pos) = self.selected.iter().position(|s| s == id) {
                self.selected.remove(pos);
                if self.current.as_ref() == Some(id) {
                    self.current = self.selected.last().cloned();
                }
            } else {
                self.selected.push(id.clone());
                self.current = Some(id.clone());
            }
            return;
        }

        if self.selected.len() == 1 && self.selected[0] == *id {
            self.clear();
            return;
        }

        self.selected = vec![id.clone()];
        self.current = Some(id.clone());
    }

    /// Drops ids that no longer exist, keeping the invariant on `current`.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&NodeId) -> bool) {
        self.selected.retain(|id| keep(id));
        if let Some(current) = &self.current {
            if !self.selected.contains(current) {
                self.current = self.selected.last().cloned();
            }
        }
    }
}
