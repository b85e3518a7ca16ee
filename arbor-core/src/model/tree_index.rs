//! `src/model/tree_index.rs`
//! ============================================================================
//! # `TreeIndex`: Authoritative Node Structure
//!
//! Flat id-keyed storage for the tree, rebuilt from the nested input on every
//! structural change:
//! - O(1) id -> node lookup, O(depth) ancestor walks
//! - ordered, parent-owned children lists
//! - atomic subtree replacement (`update_children`) and moves (`move_node`)
//! - a [`ViewFilter`] applied while flattening, never as a mutation
//!
//! Unknown ids are a normal case: lookups return `None` or an empty slice.

use ahash::{AHashMap, AHashSet};
use compact_str::CompactString;
use smallvec::SmallVec;
use tracing::{debug, instrument, warn};

use crate::{
    error::{TreeError, TreeResult},
    model::item::{ChildrenCount, ItemAccessor, NodeId, TreeItem},
};

/// Ancestor chains rarely exceed this depth.
pub type AncestorChain = SmallVec<[NodeId; 8]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub label: CompactString,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub disabled: bool,
    pub children_count: Option<ChildrenCount>,
}

impl Node {
    /// True when the node has children now or may get some from a fetch.
    #[must_use]
    pub fn is_expandable(&self) -> bool {
        !self.children.is_empty()
            || self
                .children_count
                .is_some_and(ChildrenCount::may_have_children)
    }

    /// True when expanding the node has to go through the data source first.
    #[must_use]
    pub fn needs_fetch(&self) -> bool {
        self.children.is_empty()
            && self
                .children_count
                .is_some_and(ChildrenCount::may_have_children)
    }
}

/// Hidden-item exclusion and label search, applied while flattening.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewFilter {
    /// Hidden ids take their whole subtree with them.
    pub hidden: AHashSet<NodeId>,

    /// Case-insensitive label query; keeps matches and their ancestors.
    pub search: Option<CompactString>,
}

impl ViewFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hidden.is_empty() && self.search.as_ref().is_none_or(|q| q.is_empty())
    }

    #[must_use]
    pub fn hide(mut self, id: impl Into<NodeId>) -> Self {
        self.hidden.insert(id.into());
        self
    }

    #[must_use]
    pub fn search(mut self, query: impl Into<CompactString>) -> Self {
        self.search = Some(query.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    nodes: AHashMap<NodeId, Node>,
    roots: Vec<NodeId>,
}

impl TreeIndex {
    /// Index a nested item structure. Fails on the first duplicate id.
    #[instrument(skip_all, fields(roots = roots.len()))]
    pub fn build<T, A>(roots: &[T], accessor: &A) -> TreeResult<Self>
    where
        A: ItemAccessor<T> + ?Sized,
    {
        let mut nodes: AHashMap<NodeId, Node> = AHashMap::new();
        let root_ids = collect_subtree(None, roots, accessor, &mut nodes, |_| false)?;

        debug!(
            marker = "TREE_INDEX",
            operation_type = "build",
            node_count = nodes.len(),
            "Built tree index"
        );

        Ok(Self {
            nodes,
            roots: root_ids,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn root_ids(&self) -> &[NodeId] {
        &self.roots
    }

    /// Ordered children of `id`, or of the roots when `id` is `None`.
    #[must_use]
    pub fn children_ids(&self, id: Option<&str>) -> &[NodeId] {
        match id {
            None => &self.roots,
            Some(id) => self
                .nodes
                .get(id)
                .map_or(&[] as &[NodeId], |node| node.children.as_slice()),
        }
    }

    #[must_use]
    pub fn parent_id(&self, id: &str) -> Option<&NodeId> {
        self.nodes.get(id).and_then(|node| node.parent.as_ref())
    }

    /// Ancestors of `id`, nearest first.
    #[must_use]
    pub fn ancestor_chain(&self, id: &str) -> AncestorChain {
        let mut chain = AncestorChain::new();
        let mut current = self.parent_id(id);
        while let Some(parent) = current {
            chain.push(parent.clone());
            current = self.parent_id(parent);
        }
        chain
    }

    #[must_use]
    pub fn depth(&self, id: &str) -> Option<usize> {
        self.contains(id).then(|| self.ancestor_chain(id).len())
    }

    #[must_use]
    pub fn is_descendant_of(&self, id: &str, ancestor: &str) -> bool {
        let mut current = self.parent_id(id);
        while let Some(parent) = current {
            if parent.as_str() == ancestor {
                return true;
            }
            current = self.parent_id(parent);
        }
        false
    }

    /// Parent and index of `id` within its parent's ordered children.
    #[must_use]
    pub fn position_of(&self, id: &str) -> Option<(Option<NodeId>, usize)> {
        let node = self.nodes.get(id)?;
        let siblings = self.children_ids(node.parent.as_deref());
        let index = siblings.iter().position(|sibling| sibling.as_str() == id)?;
        Some((node.parent.clone(), index))
    }

    /// Descendants of `id` in pre-order, `id` itself excluded.
    #[must_use]
    pub fn descendant_ids(&self, id: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<&NodeId> = self.children_ids(Some(id)).iter().rev().collect();
        while let Some(current) = stack.pop() {
            out.push(current.clone());
            stack.extend(self.children_ids(Some(current.as_str())).iter().rev());
        }
        out
    }

    /// Visible ids in display order: a node appears only if every ancestor
    /// is expanded and the filter keeps it.
    pub fn flatten(&self, is_expanded: impl Fn(&str) -> bool, filter: &ViewFilter) -> Vec<NodeId> {
        let search_hits = filter
            .search
            .as_ref()
            .filter(|query| !query.is_empty())
            .map(|query| self.search_hits(query));

        let mut out = Vec::with_capacity(self.nodes.len().min(256));
        let mut stack: Vec<&NodeId> = self.roots.iter().rev().collect();

        while let Some(id) = stack.pop() {
            if filter.hidden.contains(id) {
                continue;
            }
            if let Some(hits) = &search_hits
                && !hits.contains(id.as_str())
            {
                continue;
            }
            out.push(id.clone());
            if is_expanded(id.as_str()) {
                stack.extend(self.children_ids(Some(id.as_str())).iter().rev());
            }
        }

        out
    }

    /// Matching nodes plus every ancestor of a match.
    fn search_hits(&self, query: &str) -> AHashSet<&str> {
        let needle = query.to_lowercase();
        let mut hits = AHashSet::new();
        for node in self.nodes.values() {
            if !node.label.to_lowercase().contains(&needle) {
                continue;
            }
            hits.insert(node.id.as_str());
            let mut current = node.parent.as_ref();
            while let Some(parent) = current {
                if !hits.insert(parent.as_str()) {
                    break;
                }
                current = self.parent_id(parent);
            }
        }
        hits
    }

    /// Replace the children of `parent` (or the roots) with `items`.
    ///
    /// Ids that survive keep their identity; ids that disappear are dropped
    /// with their subtrees. Returns `Ok(false)` for an unknown parent.
    #[instrument(skip(self, items, accessor), fields(new_children = items.len()))]
    pub fn update_children<T, A>(
        &mut self,
        parent: Option<&str>,
        items: &[T],
        accessor: &A,
    ) -> TreeResult<bool>
    where
        A: ItemAccessor<T> + ?Sized,
    {
        if let Some(parent) = parent
            && !self.contains(parent)
        {
            debug!(
                marker = "TREE_INDEX",
                operation_type = "update_children_unknown_parent",
                parent,
                "Ignoring children update for unknown parent"
            );
            return Ok(false);
        }

        let replaced: AHashSet<NodeId> = match parent {
            Some(parent) => self.descendant_ids(parent).into_iter().collect(),
            None => self.nodes.keys().cloned().collect(),
        };

        // Validate into a scratch map so a failure leaves the index untouched.
        let mut fresh: AHashMap<NodeId, Node> = AHashMap::new();
        let parent_id = parent.map(NodeId::from);
        let child_ids = collect_subtree(parent_id, items, accessor, &mut fresh, |id| {
            self.nodes.contains_key(id) && !replaced.contains(id)
        })?;

        for id in &replaced {
            self.nodes.remove(id);
        }
        self.nodes.extend(fresh);

        match parent {
            Some(parent) => {
                if let Some(node) = self.nodes.get_mut(parent) {
                    if node.children_count.is_some() {
                        node.children_count = Some(ChildrenCount::Known(child_ids.len()));
                    }
                    node.children = child_ids;
                }
            }
            None => self.roots = child_ids,
        }

        debug!(
            marker = "TREE_INDEX",
            operation_type = "update_children",
            removed = replaced.len(),
            node_count = self.nodes.len(),
            "Replaced subtree"
        );
        Ok(true)
    }

    /// Structural half of a reorder: detach `id` and insert it at `new_index`
    /// under `new_parent`. The index is clamped to the destination length.
    pub fn move_node(
        &mut self,
        id: &str,
        new_parent: Option<&str>,
        new_index: usize,
    ) -> TreeResult<()> {
        let Some(node) = self.nodes.get(id) else {
            return Err(TreeError::UnknownItem(NodeId::from(id)));
        };
        if let Some(target) = new_parent {
            if !self.contains(target) {
                return Err(TreeError::UnknownItem(NodeId::from(target)));
            }
            if target == id || self.is_descendant_of(target, id) {
                return Err(TreeError::CycleDetected {
                    item: NodeId::from(id),
                    parent: NodeId::from(target),
                });
            }
        }

        let moved = node.id.clone();
        let old_parent = node.parent.clone();
        self.siblings_mut(old_parent.as_deref())
            .retain(|sibling| sibling != &moved);

        let destination = self.siblings_mut(new_parent);
        let at = new_index.min(destination.len());
        destination.insert(at, moved.clone());

        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = new_parent.map(NodeId::from);
        }
        Ok(())
    }

    fn siblings_mut(&mut self, parent: Option<&str>) -> &mut Vec<NodeId> {
        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(node) => &mut node.children,
            None => &mut self.roots,
        }
    }

    pub fn set_label(&mut self, id: &str, label: impl Into<CompactString>) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.label = label.into();
                true
            }
            None => false,
        }
    }

    /// Returns true when the flag actually changed.
    pub fn set_disabled(&mut self, id: &str, disabled: bool) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) if node.disabled != disabled => {
                node.disabled = disabled;
                true
            }
            _ => false,
        }
    }

    /// Rebuild the nested item for `id` and its loaded subtree.
    #[must_use]
    pub fn item(&self, id: &str) -> Option<TreeItem> {
        let node = self.nodes.get(id)?;
        Some(TreeItem {
            id: node.id.clone(),
            label: node.label.clone(),
            children: node
                .children
                .iter()
                .filter_map(|child| self.item(child))
                .collect(),
            disabled: node.disabled,
            children_count: node.children_count,
        })
    }

    /// The whole tree as nested items, in order.
    #[must_use]
    pub fn item_tree(&self) -> Vec<TreeItem> {
        self.roots.iter().filter_map(|id| self.item(id)).collect()
    }
}

/// Walk `items` depth-first into `out`, returning the ids of the top level.
/// `taken` reports ids already owned elsewhere in the tree.
fn collect_subtree<T, A>(
    parent: Option<NodeId>,
    items: &[T],
    accessor: &A,
    out: &mut AHashMap<NodeId, Node>,
    taken: impl Fn(&str) -> bool,
) -> TreeResult<Vec<NodeId>>
where
    A: ItemAccessor<T> + ?Sized,
{
    let top: Vec<NodeId> = items.iter().map(|item| accessor.id_of(item)).collect();
    let mut stack: Vec<(Option<NodeId>, &T)> =
        items.iter().rev().map(|item| (parent.clone(), item)).collect();

    while let Some((parent, item)) = stack.pop() {
        let id = accessor.id_of(item);
        if out.contains_key(&id) || taken(id.as_str()) {
            warn!(
                marker = "TREE_INDEX",
                operation_type = "duplicate_id",
                id = %id,
                "Rejecting structure with duplicate id"
            );
            return Err(TreeError::DuplicateId(id));
        }

        let children = accessor.children_of(item);
        let node = Node {
            id: id.clone(),
            label: accessor.label_of(item),
            children: children.iter().map(|child| accessor.id_of(child)).collect(),
            parent,
            disabled: accessor.is_disabled(item),
            children_count: accessor.children_count(item),
        };
        out.insert(id.clone(), node);
        stack.extend(children.iter().rev().map(|child| (Some(id.clone()), child)));
    }

    Ok(top)
}
