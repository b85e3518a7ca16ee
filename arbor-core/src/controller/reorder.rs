//! `src/controller/reorder.rs`
//! ============================================================================
//! # Reorder Engine: Validated Moves
//!
//! A move is proposed, checked against structural rules and the host's
//! permission predicate, and only then committed to the index. `new_index` is
//! the final position of the item among its new siblings.

use compact_str::CompactString;
use tracing::{debug, info};

use crate::{
    error::{TreeError, TreeResult},
    model::{item::NodeId, tree_index::TreeIndex},
};

/// Per-item yes/no predicate supplied by the host.
pub type ItemPredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub item: NodeId,
    pub old_parent: Option<NodeId>,
    pub old_index: usize,
    pub new_parent: Option<NodeId>,
    pub new_index: usize,
}

/// Host veto over a structurally valid move.
pub trait MovePermission: Send + Sync {
    fn can_move(&self, request: &MoveRequest) -> bool;
}

impl<F> MovePermission for F
where
    F: Fn(&MoveRequest) -> bool + Send + Sync,
{
    fn can_move(&self, request: &MoveRequest) -> bool {
        self(request)
    }
}

#[derive(Debug)]
enum Verdict {
    Allowed(MoveRequest),
    Unknown,
    Unchanged,
    Rejected(TreeError),
}

#[derive(Default)]
pub struct ReorderEngine {
    enabled: bool,
    permission: Option<Box<dyn MovePermission>>,
    reorderable: Option<ItemPredicate>,
}

impl ReorderEngine {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_permission(mut self, permission: impl MovePermission + 'static) -> Self {
        self.permission = Some(Box::new(permission));
        self
    }

    #[must_use]
    pub fn with_reorderable(mut self, predicate: ItemPredicate) -> Self {
        self.reorderable = Some(predicate);
        self
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether `id` may be picked up at all.
    #[must_use]
    pub fn is_reorderable(&self, index: &TreeIndex, id: &str) -> bool {
        self.enabled
            && index.get(id).is_some_and(|node| !node.disabled)
            && self.reorderable.as_ref().is_none_or(|predicate| predicate(id))
    }

    #[must_use]
    pub fn propose_move(
        &self,
        index: &TreeIndex,
        id: &str,
        new_parent: Option<&str>,
        new_index: usize,
    ) -> bool {
        matches!(
            self.evaluate(index, id, new_parent, new_index),
            Verdict::Allowed(_)
        )
    }

    /// Re-check and apply. `Ok(None)` for unknown ids and same-position moves.
    pub fn commit_move(
        &self,
        index: &mut TreeIndex,
        id: &str,
        new_parent: Option<&str>,
        new_index: usize,
    ) -> TreeResult<Option<MoveRequest>> {
        let request = match self.evaluate(index, id, new_parent, new_index) {
            Verdict::Allowed(request) => request,
            Verdict::Unknown | Verdict::Unchanged => return Ok(None),
            Verdict::Rejected(err) => return Err(err),
        };

        index.move_node(id, new_parent, request.new_index)?;
        info!(
            marker = "REORDER",
            operation_type = "commit_move",
            item = %request.item,
            old_parent = ?request.old_parent,
            new_parent = ?request.new_parent,
            new_index = request.new_index,
            "Moved item"
        );
        Ok(Some(request))
    }

    fn evaluate(
        &self,
        index: &TreeIndex,
        id: &str,
        new_parent: Option<&str>,
        new_index: usize,
    ) -> Verdict {
        let Some((old_parent, old_index)) = index.position_of(id) else {
            return Verdict::Unknown;
        };
        if let Some(target) = new_parent
            && !index.contains(target)
        {
            return Verdict::Unknown;
        }

        if let Some(target) = new_parent
            && (target == id || index.is_descendant_of(target, id))
        {
            return Verdict::Rejected(TreeError::CycleDetected {
                item: NodeId::from(id),
                parent: NodeId::from(target),
            });
        }

        let same_parent = old_parent.as_deref() == new_parent;
        let siblings_after_removal = index.children_ids(new_parent).len() - usize::from(same_parent);
        let new_index = new_index.min(siblings_after_removal);
        if same_parent && new_index == old_index {
            return Verdict::Unchanged;
        }

        let request = MoveRequest {
            item: NodeId::from(id),
            old_parent,
            old_index,
            new_parent: new_parent.map(NodeId::from),
            new_index,
        };

        let reason: Option<CompactString> = if !self.enabled {
            Some("reordering is disabled".into())
        } else if !self.is_reorderable(index, id) {
            Some("item is not reorderable".into())
        } else if let Some(target) = new_parent
            && index.get(target).is_some_and(|node| node.disabled)
        {
            Some("target parent is disabled".into())
        } else if self
            .permission
            .as_ref()
            .is_some_and(|permission| !permission.can_move(&request))
        {
            Some("move denied by permission predicate".into())
        } else {
            None
        };

        match reason {
            Some(reason) => {
                debug!(
                    marker = "REORDER",
                    operation_type = "move_rejected",
                    item = id,
                    reason = %reason,
                    "Move rejected"
                );
                Verdict::Rejected(TreeError::MoveRejected {
                    item: NodeId::from(id),
                    reason,
                })
            }
            None => Verdict::Allowed(request),
        }
    }
}

impl std::fmt::Debug for ReorderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReorderEngine")
            .field("enabled", &self.enabled)
            .field("has_permission", &self.permission.is_some())
            .field("has_reorderable", &self.reorderable.is_some())
            .finish()
    }
}
