//! `src/model/ownership.rs`
//! ============================================================================
//! # Controlled / Uncontrolled State Ownership
//!
//! Expansion and selection share one command API; who owns the resulting id
//! set is a strategy. `Uncontrolled` keeps what it is offered. `Controlled`
//! drops offers and only changes when the host feeds a value back through
//! [`StateOwner::sync`].

use std::fmt::Debug;

use ahash::RandomState;
use indexmap::IndexSet;

use crate::model::{item::NodeId, tree_index::TreeIndex};

/// Insertion-ordered id set shared by the expansion and selection stores.
pub type IdSet = IndexSet<NodeId, RandomState>;

pub trait StateOwner: Send + Debug {
    fn current(&self) -> &IdSet;

    /// Offer the next value. Returns true when the local copy changed.
    fn offer(&mut self, next: IdSet) -> bool;

    /// Install an authoritative value from the host.
    fn sync(&mut self, value: IdSet);

    fn is_controlled(&self) -> bool;
}

#[derive(Debug, Default)]
pub struct Uncontrolled {
    value: IdSet,
}

impl StateOwner for Uncontrolled {
    fn current(&self) -> &IdSet {
        &self.value
    }

    fn offer(&mut self, next: IdSet) -> bool {
        self.value = next;
        true
    }

    fn sync(&mut self, value: IdSet) {
        self.value = value;
    }

    fn is_controlled(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct Controlled {
    value: IdSet,
}

impl StateOwner for Controlled {
    fn current(&self) -> &IdSet {
        &self.value
    }

    fn offer(&mut self, _next: IdSet) -> bool {
        false
    }

    fn sync(&mut self, value: IdSet) {
        self.value = value;
    }

    fn is_controlled(&self) -> bool {
        true
    }
}

/// Which side owns a store's id set, with its initial value.
#[derive(Debug, Clone)]
pub enum Ownership {
    Controlled(IdSet),
    Uncontrolled(IdSet),
}

impl Ownership {
    pub fn controlled<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        Self::Controlled(ids.into_iter().map(Into::into).collect())
    }

    pub fn uncontrolled<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        Self::Uncontrolled(ids.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn into_owner(self) -> Box<dyn StateOwner> {
        match self {
            Self::Controlled(value) => Box::new(Controlled { value }),
            Self::Uncontrolled(value) => Box::new(Uncontrolled { value }),
        }
    }
}

impl Default for Ownership {
    fn default() -> Self {
        Self::Uncontrolled(IdSet::default())
    }
}

/// Copy of `set` without ids the index no longer knows. `None` when nothing dangles.
#[must_use]
pub fn without_dangling(set: &IdSet, index: &TreeIndex) -> Option<IdSet> {
    if set.iter().all(|id| index.contains(id)) {
        return None;
    }
    Some(set.iter().filter(|id| index.contains(id)).cloned().collect())
}
