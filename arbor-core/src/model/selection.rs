//! `src/model/selection.rs`
//! ============================================================================
//! # `SelectionStore`: Selected Node Ids and Propagation
//!
//! - Single mode holds at most one id by construction
//! - `descendants` propagation pushes a change down the existing subtree
//! - `parents` propagation derives each ancestor as the conjunction of its
//!   existing children, walking up until an ancestor is unchanged
//! - range and select-all are flat operations over the visible order
//!
//! Tri-state display is not stored: a parent with some but not all children
//! selected is simply unselected, and [`SelectionStore::is_indeterminate`]
//! re-derives the partial state from the subtree for renderers.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{
    item::NodeId,
    ownership::{IdSet, Ownership, StateOwner, without_dangling},
    tree_index::TreeIndex,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Single,
    Multiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Propagation {
    pub descendants: bool,
    pub parents: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChange {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    pub next: IdSet,
}

#[derive(Debug)]
pub struct SelectionStore {
    owner: Box<dyn StateOwner>,
    mode: SelectionMode,
    propagation: Propagation,
    disabled: bool,
}

impl SelectionStore {
    #[must_use]
    pub fn new(ownership: Ownership, mode: SelectionMode, propagation: Propagation) -> Self {
        Self {
            owner: ownership.into_owner(),
            mode,
            propagation,
            disabled: false,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> SelectionMode {
        self.mode
    }

    #[must_use]
    pub const fn propagation(&self) -> Propagation {
        self.propagation
    }

    /// Turns every selection command into a no-op.
    pub const fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    #[must_use]
    pub fn is_selected(&self, id: &str) -> bool {
        self.owner.current().contains(id)
    }

    #[must_use]
    pub fn selected_ids(&self) -> &IdSet {
        self.owner.current()
    }

    #[must_use]
    pub fn is_controlled(&self) -> bool {
        self.owner.is_controlled()
    }

    /// Unselected, but with at least one selected descendant.
    #[must_use]
    pub fn is_indeterminate(&self, index: &TreeIndex, id: &str) -> bool {
        !self.is_selected(id)
            && index
                .descendant_ids(id)
                .iter()
                .any(|descendant| self.is_selected(descendant))
    }

    /// Set membership of one node, applying the configured propagation.
    pub fn set_selected(
        &mut self,
        index: &TreeIndex,
        id: &str,
        value: bool,
    ) -> Option<SelectionChange> {
        if self.disabled || !index.contains(id) {
            return None;
        }

        let mut next = self.owner.current().clone();
        match self.mode {
            SelectionMode::Single => {
                if value {
                    next.clear();
                    next.insert(NodeId::from(id));
                } else {
                    next.shift_remove(id);
                }
            }
            SelectionMode::Multiple => {
                let has_children = !index.children_ids(Some(id)).is_empty();
                apply(&mut next, id, value);
                // A derived parent can only hold a value its subtree agrees with.
                if self.propagation.descendants || (self.propagation.parents && has_children) {
                    for descendant in index.descendant_ids(id) {
                        apply(&mut next, &descendant, value);
                    }
                }
                if self.propagation.parents {
                    recompute_ancestors(index, &mut next, index.parent_id(id));
                }
            }
        }

        self.commit(next, "set_selected")
    }

    /// Flat selection of every visible node between `from` and `to`, inclusive.
    pub fn select_range(
        &mut self,
        visible: &[NodeId],
        from: &str,
        to: &str,
        is_disabled: impl Fn(&str) -> bool,
    ) -> Option<SelectionChange> {
        if self.disabled || self.mode == SelectionMode::Single {
            return None;
        }
        let start = visible.iter().position(|id| id.as_str() == from)?;
        let end = visible.iter().position(|id| id.as_str() == to)?;
        let (low, high) = if start <= end { (start, end) } else { (end, start) };

        let mut next = self.owner.current().clone();
        for id in &visible[low..=high] {
            if !is_disabled(id.as_str()) {
                next.insert(id.clone());
            }
        }
        self.commit(next, "select_range")
    }

    pub fn select_all(
        &mut self,
        visible: &[NodeId],
        is_disabled: impl Fn(&str) -> bool,
    ) -> Option<SelectionChange> {
        if self.disabled || self.mode == SelectionMode::Single {
            return None;
        }
        let mut next = self.owner.current().clone();
        next.extend(visible.iter().filter(|id| !is_disabled(id.as_str())).cloned());
        self.commit(next, "select_all")
    }

    pub fn clear(&mut self) -> Option<SelectionChange> {
        if self.disabled {
            return None;
        }
        self.commit(IdSet::default(), "clear")
    }

    /// Re-derive parents after a structural change touched `ids`.
    ///
    /// Each id's own membership is recomputed from its children (when it has
    /// any) and the walk continues upward.
    pub fn reconcile_parents(&mut self, index: &TreeIndex, ids: &[NodeId]) -> Option<SelectionChange> {
        if !self.propagation.parents || self.mode == SelectionMode::Single {
            return None;
        }
        let mut next = self.owner.current().clone();
        for id in ids {
            recompute_ancestors(index, &mut next, Some(id));
        }
        self.commit(next, "reconcile_parents")
    }

    /// Switching to single mode keeps only the most recently selected id.
    pub fn set_mode(&mut self, mode: SelectionMode) -> Option<SelectionChange> {
        self.mode = mode;
        if mode == SelectionMode::Multiple || self.owner.current().len() <= 1 {
            return None;
        }
        let next: IdSet = self.owner.current().last().cloned().into_iter().collect();
        self.commit(next, "set_mode")
    }

    pub fn sync<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        self.owner.sync(ids.into_iter().map(Into::into).collect());
    }

    pub fn prune(&mut self, index: &TreeIndex) -> bool {
        if self.owner.is_controlled() {
            return false;
        }
        match without_dangling(self.owner.current(), index) {
            Some(next) => self.owner.offer(next),
            None => false,
        }
    }

    fn commit(&mut self, next: IdSet, operation: &'static str) -> Option<SelectionChange> {
        let current = self.owner.current();
        let added: Vec<NodeId> = next
            .iter()
            .filter(|id| !current.contains(id.as_str()))
            .cloned()
            .collect();
        let removed: Vec<NodeId> = current
            .iter()
            .filter(|id| !next.contains(id.as_str()))
            .cloned()
            .collect();
        if added.is_empty() && removed.is_empty() {
            return None;
        }

        debug!(
            marker = "SELECTION",
            operation_type = operation,
            added = added.len(),
            removed = removed.len(),
            controlled = self.owner.is_controlled(),
            "Selection change"
        );

        self.owner.offer(next.clone());
        Some(SelectionChange {
            added,
            removed,
            next,
        })
    }
}

impl Default for SelectionStore {
    fn default() -> Self {
        Self::new(
            Ownership::default(),
            SelectionMode::default(),
            Propagation::default(),
        )
    }
}

fn apply(set: &mut IdSet, id: &str, value: bool) {
    if value {
        if !set.contains(id) {
            set.insert(NodeId::from(id));
        }
    } else {
        set.shift_remove(id);
    }
}

/// Walk upward from `start`, setting each node to the conjunction of its
/// existing children. Stops at the first node whose membership is unchanged.
fn recompute_ancestors(index: &TreeIndex, set: &mut IdSet, start: Option<&NodeId>) {
    let mut current = start;
    while let Some(id) = current {
        let children = index.children_ids(Some(id.as_str()));
        if children.is_empty() {
            break;
        }
        let all_selected = children.iter().all(|child| set.contains(child.as_str()));
        if all_selected == set.contains(id.as_str()) {
            break;
        }
        apply(set, id, all_selected);
        current = index.parent_id(id);
    }
}
