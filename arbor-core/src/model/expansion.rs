//! `src/model/expansion.rs`
//! ============================================================================
//! # `ExpansionStore`: Expanded Node Ids
//!
//! Pure set logic. Whether a node may expand at all (exists, enabled, has
//! children) and whether expanding it must fetch first is decided by the
//! caller, which also turns changes into events and fetch effects.

use tracing::debug;

use crate::model::{
    item::NodeId,
    ownership::{IdSet, Ownership, StateOwner, without_dangling},
    tree_index::TreeIndex,
};

/// Outcome of an expansion command: what toggled and the resulting set.
///
/// In controlled mode `next` is the would-be value the host should feed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionChange {
    pub toggled: Vec<NodeId>,
    pub expanded: bool,
    pub next: IdSet,
}

#[derive(Debug)]
pub struct ExpansionStore {
    owner: Box<dyn StateOwner>,
}

impl ExpansionStore {
    #[must_use]
    pub fn new(ownership: Ownership) -> Self {
        Self {
            owner: ownership.into_owner(),
        }
    }

    #[must_use]
    pub fn is_expanded(&self, id: &str) -> bool {
        self.owner.current().contains(id)
    }

    #[must_use]
    pub fn expanded_ids(&self) -> &IdSet {
        self.owner.current()
    }

    #[must_use]
    pub fn is_controlled(&self) -> bool {
        self.owner.is_controlled()
    }

    /// `None` when `id` already has the requested state.
    pub fn set_expanded(&mut self, id: &str, value: bool) -> Option<ExpansionChange> {
        self.set_many([id], value)
    }

    pub fn toggle(&mut self, id: &str) -> Option<ExpansionChange> {
        let value = !self.is_expanded(id);
        self.set_expanded(id, value)
    }

    /// Apply one state to several ids as a single change.
    pub fn set_many<'a>(
        &mut self,
        ids: impl IntoIterator<Item = &'a str>,
        value: bool,
    ) -> Option<ExpansionChange> {
        let current = self.owner.current();
        let toggled: Vec<NodeId> = ids
            .into_iter()
            .filter(|id| current.contains(*id) != value)
            .map(NodeId::from)
            .collect();
        if toggled.is_empty() {
            return None;
        }

        let mut next = current.clone();
        for id in &toggled {
            if value {
                next.insert(id.clone());
            } else {
                next.shift_remove(id.as_str());
            }
        }

        debug!(
            marker = "EXPANSION",
            operation_type = if value { "expand" } else { "collapse" },
            toggled = toggled.len(),
            controlled = self.owner.is_controlled(),
            "Expansion change"
        );

        self.owner.offer(next.clone());
        Some(ExpansionChange {
            toggled,
            expanded: value,
            next,
        })
    }

    /// Host feedback in controlled mode (or a reset in uncontrolled mode).
    pub fn sync<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        self.owner.sync(ids.into_iter().map(Into::into).collect());
    }

    /// Drop ids of removed nodes. Controlled sets are left to the host.
    pub fn prune(&mut self, index: &TreeIndex) -> bool {
        if self.owner.is_controlled() {
            return false;
        }
        match without_dangling(self.owner.current(), index) {
            Some(next) => self.owner.offer(next),
            None => false,
        }
    }
}

impl Default for ExpansionStore {
    fn default() -> Self {
        Self::new(Ownership::default())
    }
}
