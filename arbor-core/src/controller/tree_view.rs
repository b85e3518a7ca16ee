//! `src/controller/tree_view.rs`
//! ============================================================================
//! # `TreeView`: Control Surface over the Tree State Engine
//!
//! Composes the index, the expansion/selection stores, navigation, reordering
//! and the lazy-loading cache behind one id-addressed API. Every command:
//! - treats unknown ids as a no-op (`false` / `None`)
//! - refuses disabled targets
//! - records what changed as [`TreeEvent`]s
//! - queues I/O as an [`Effect`] instead of performing it
//!
//! Hosts drain events with [`TreeView::take_events`] and run queued fetches
//! with [`TreeView::run_effects`].

use std::{cell::OnceCell, collections::VecDeque, sync::Arc};

use compact_str::CompactString;
use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::{
    cache::{
        data_source::{DataSource, FetchError},
        lazy_cache::{CacheStatsSnapshot, EntryState, LazyCache, LoadedItem},
    },
    config::TreeConfig,
    controller::{
        actions::{Effect, TreeAction},
        events::{EventQueue, TreeEvent},
        navigation::{Modifiers, NavCommand, NavContext, NavIntent, NavigationState},
        reorder::{ItemPredicate, MovePermission, ReorderEngine},
    },
    error::{TreeError, TreeResult},
    model::{
        expansion::{ExpansionChange, ExpansionStore},
        item::{DefaultAccessor, ItemAccessor, NodeId, TreeItem},
        ownership::{IdSet, Ownership},
        selection::{SelectionChange, SelectionMode, SelectionStore},
        tree_index::{TreeIndex, ViewFilter},
    },
    util::clock::{Clock, SystemClock},
};

#[derive(Default)]
pub struct TreeViewBuilder {
    config: TreeConfig,
    index: Option<TreeResult<TreeIndex>>,
    expanded: Ownership,
    selected: Ownership,
    source: Option<Arc<dyn DataSource>>,
    clock: Option<Arc<dyn Clock>>,
    reorder: ReorderEngine,
    editable: Option<ItemPredicate>,
    filter: ViewFilter,
}

impl TreeViewBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: TreeConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn items(self, roots: Vec<TreeItem>) -> Self {
        self.items_with(&roots, &DefaultAccessor)
    }

    /// Index host items through a custom accessor. Indexing errors surface
    /// from [`TreeViewBuilder::build`].
    #[must_use]
    pub fn items_with<T, A>(mut self, roots: &[T], accessor: &A) -> Self
    where
        A: ItemAccessor<T> + ?Sized,
    {
        self.index = Some(TreeIndex::build(roots, accessor));
        self
    }

    #[must_use]
    pub fn expanded(mut self, ownership: Ownership) -> Self {
        self.expanded = ownership;
        self
    }

    #[must_use]
    pub fn selected(mut self, ownership: Ownership) -> Self {
        self.selected = ownership;
        self
    }

    #[must_use]
    pub fn data_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn items_reordering(mut self, enabled: bool) -> Self {
        self.reorder = self.reorder.enabled(enabled);
        self
    }

    #[must_use]
    pub fn move_permission(mut self, permission: impl MovePermission + 'static) -> Self {
        self.reorder = self.reorder.with_permission(permission);
        self
    }

    #[must_use]
    pub fn reorderable(mut self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.reorder = self.reorder.with_reorderable(Box::new(predicate));
        self
    }

    #[must_use]
    pub fn editable(mut self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.editable = Some(Box::new(predicate));
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: ViewFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn build(self) -> TreeResult<TreeView> {
        self.config.validate()?;
        let index = self.index.transpose()?.unwrap_or_default();

        let mut selection = SelectionStore::new(
            self.selected,
            self.config.selection.mode(),
            self.config.selection.propagation,
        );
        selection.set_disabled(self.config.selection.disable_selection);

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let cache = self.source.map(|source| {
            LazyCache::with_clock(source, self.config.lazy_loading.clone(), clock)
        });

        info!(
            marker = "TREE_VIEW",
            operation_type = "build",
            node_count = index.len(),
            lazy_loading = cache.is_some(),
            reordering = self.reorder.is_enabled(),
            "Tree view ready"
        );

        Ok(TreeView {
            config: self.config,
            index,
            expansion: ExpansionStore::new(self.expanded),
            selection,
            navigation: NavigationState::default(),
            reorder: self.reorder,
            filter: self.filter,
            editing: None,
            editable: self.editable,
            cache,
            events: EventQueue::default(),
            effects: VecDeque::new(),
            visible: OnceCell::new(),
        })
    }
}

pub struct TreeView {
    config: TreeConfig,
    index: TreeIndex,
    expansion: ExpansionStore,
    selection: SelectionStore,
    navigation: NavigationState,
    reorder: ReorderEngine,
    filter: ViewFilter,
    editing: Option<NodeId>,
    editable: Option<ItemPredicate>,
    cache: Option<LazyCache>,
    events: EventQueue,
    effects: VecDeque<Effect>,
    /// Memoized `flatten` result; reset on every change that can affect it.
    visible: OnceCell<Vec<NodeId>>,
}

/// Binds `$ctx` to a navigation context built from disjoint field borrows,
/// so the caller can still mutate `navigation` and `events` while it lives.
macro_rules! nav_context {
    ($view:expr, $ctx:ident) => {
        let expansion = &$view.expansion;
        let is_expanded = |id: &str| expansion.is_expanded(id);
        let $ctx = NavContext {
            visible: visible_in(&$view.visible, &$view.index, &$view.expansion, &$view.filter),
            index: &$view.index,
            is_expanded: &is_expanded,
            config: &$view.config.navigation,
            multi_select: $view.selection.mode() == SelectionMode::Multiple,
        };
    };
}

fn visible_in<'a>(
    cell: &'a OnceCell<Vec<NodeId>>,
    index: &TreeIndex,
    expansion: &ExpansionStore,
    filter: &ViewFilter,
) -> &'a [NodeId] {
    cell.get_or_init(|| index.flatten(|id| expansion.is_expanded(id), filter))
}

fn is_disabled_in(index: &TreeIndex, id: &str) -> bool {
    index.get(id).is_some_and(|node| node.disabled)
}

impl TreeView {
    #[must_use]
    pub fn builder() -> TreeViewBuilder {
        TreeViewBuilder::new()
    }

    #[must_use]
    pub const fn config(&self) -> &TreeConfig {
        &self.config
    }

    #[must_use]
    pub const fn index(&self) -> &TreeIndex {
        &self.index
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Ids in display order, respecting expansion and the view filter.
    #[must_use]
    pub fn visible_items(&self) -> &[NodeId] {
        visible_in(&self.visible, &self.index, &self.expansion, &self.filter)
    }

    #[must_use]
    pub fn get_item(&self, id: &str) -> Option<TreeItem> {
        self.index.item(id)
    }

    #[must_use]
    pub fn get_item_tree(&self) -> Vec<TreeItem> {
        self.index.item_tree()
    }

    #[must_use]
    pub fn get_parent_id(&self, id: &str) -> Option<&NodeId> {
        self.index.parent_id(id)
    }

    /// Children of `parent` in order; `None` lists the roots.
    #[must_use]
    pub fn get_item_ordered_children_ids(&self, parent: Option<&str>) -> &[NodeId] {
        self.index.children_ids(parent)
    }

    #[must_use]
    pub fn is_item_expanded(&self, id: &str) -> bool {
        self.expansion.is_expanded(id)
    }

    #[must_use]
    pub fn expanded_ids(&self) -> &IdSet {
        self.expansion.expanded_ids()
    }

    #[must_use]
    pub fn is_item_selected(&self, id: &str) -> bool {
        self.selection.is_selected(id)
    }

    /// Some but not all of the subtree selected; for tri-state rendering.
    #[must_use]
    pub fn is_item_indeterminate(&self, id: &str) -> bool {
        self.selection.is_indeterminate(&self.index, id)
    }

    #[must_use]
    pub fn selected_ids(&self) -> &IdSet {
        self.selection.selected_ids()
    }

    #[must_use]
    pub fn is_item_disabled(&self, id: &str) -> bool {
        is_disabled_in(&self.index, id)
    }

    #[must_use]
    pub fn focused_item(&self) -> Option<&NodeId> {
        self.navigation.focused()
    }

    #[must_use]
    pub fn range_anchor(&self) -> Option<&NodeId> {
        self.navigation.range_anchor()
    }

    #[must_use]
    pub fn edited_item(&self) -> Option<&NodeId> {
        self.editing.as_ref()
    }

    #[must_use]
    pub fn is_item_editable(&self, id: &str) -> bool {
        self.index.get(id).is_some_and(|node| !node.disabled)
            && self.editable.as_ref().is_some_and(|predicate| predicate(id))
    }

    #[must_use]
    pub fn is_item_reorderable(&self, id: &str) -> bool {
        self.reorder.is_reorderable(&self.index, id)
    }

    /// Load state of `id`'s children in the cache, when lazy loading is on.
    #[must_use]
    pub fn load_state(&self, id: &str) -> Option<EntryState> {
        self.cache
            .as_ref()
            .and_then(|cache| cache.entry_state(Some(&NodeId::from(id))))
    }

    #[must_use]
    pub fn cache_stats(&self) -> Option<CacheStatsSnapshot> {
        self.cache.as_ref().map(LazyCache::stats)
    }

    #[must_use]
    pub const fn cache(&self) -> Option<&LazyCache> {
        self.cache.as_ref()
    }

    pub fn pending_effects(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter()
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    /// Drain every event recorded since the last call, oldest first.
    pub fn take_events(&mut self) -> Vec<TreeEvent> {
        self.events.drain()
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TreeEvent> {
        self.events.subscribe()
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    #[instrument(skip(self), level = "debug")]
    pub fn dispatch(&mut self, action: TreeAction) -> TreeResult<()> {
        match action {
            TreeAction::Navigate { command, modifiers } => self.navigate(command, modifiers),
            TreeAction::ReleaseModifier => self.navigation.release_modifier(),
            TreeAction::FocusItem(id) => {
                self.focus_item(&id);
            }
            TreeAction::Blur => {
                self.blur();
            }
            TreeAction::SetExpansion { id, expanded } => {
                self.set_item_expansion(&id, expanded);
            }
            TreeAction::ToggleExpansion(id) => {
                self.toggle_item_expansion(&id);
            }
            TreeAction::SetSelection { id, selected } => {
                self.set_item_selection(&id, selected);
            }
            TreeAction::SelectRange { from, to } => {
                self.select_range(&from, &to);
            }
            TreeAction::ClearSelection => {
                self.clear_selection();
            }
            TreeAction::SetDisabled { id, disabled } => {
                self.set_is_item_disabled(&id, disabled);
            }
            TreeAction::SetEditedItem(id) => {
                self.set_edited_item(id.as_deref());
            }
            TreeAction::UpdateLabel { id, label } => {
                self.update_item_label(&id, label);
            }
            TreeAction::MoveItem {
                id,
                new_parent,
                new_index,
            } => {
                self.commit_move(&id, new_parent.as_deref(), new_index)?;
            }
            TreeAction::ReloadChildren(id) => {
                self.reload_children(&id);
            }
        }
        Ok(())
    }

    pub fn navigate(&mut self, command: NavCommand, modifiers: Modifiers) {
        let before = self.navigation.focused().cloned();
        let intents = {
            nav_context!(self, ctx);
            self.navigation.apply(command, modifiers, &ctx)
        };

        for intent in intents {
            match intent {
                NavIntent::Focus(to) => self.events.push(TreeEvent::FocusChanged {
                    from: before.clone(),
                    to: Some(to),
                }),
                NavIntent::SetExpanded { id, expanded } => {
                    self.set_item_expansion(&id, expanded);
                }
                NavIntent::ExpandSiblings(id) => {
                    self.expand_all_siblings(&id);
                }
                NavIntent::ToggleSelection(id) => {
                    let selected = !self.selection.is_selected(&id);
                    self.set_item_selection(&id, selected);
                }
                NavIntent::SelectRange { anchor, to } => {
                    self.select_range(&anchor, &to);
                }
                NavIntent::SelectAll => {
                    self.select_all();
                }
                NavIntent::ClearSelection => {
                    self.clear_selection();
                }
            }
        }
    }

    /// Focus a visible, focusable item.
    pub fn focus_item(&mut self, id: &str) -> bool {
        let before = self.navigation.focused().cloned();
        let moved = {
            nav_context!(self, ctx);
            self.navigation.focus(id, &ctx)
        };
        if moved {
            self.events.push(TreeEvent::FocusChanged {
                from: before,
                to: Some(NodeId::from(id)),
            });
        }
        moved
    }

    /// Drop focus and the range anchor.
    pub fn blur(&mut self) -> bool {
        let Some(from) = self.navigation.blur() else {
            return false;
        };
        self.events.push(TreeEvent::FocusChanged {
            from: Some(from),
            to: None,
        });
        true
    }

    /// Expanding requires an enabled node that has, or may fetch, children.
    /// Expanding a node whose children are not loaded yet queues a fetch,
    /// even when it is already expanded.
    pub fn set_item_expansion(&mut self, id: &str, expanded: bool) -> bool {
        let Some(node) = self.index.get(id) else {
            return false;
        };
        if node.disabled || (expanded && !node.is_expandable()) {
            return false;
        }
        if expanded && node.needs_fetch() {
            self.queue_fetch(id);
        }

        let Some(change) = self.expansion.set_expanded(id, expanded) else {
            return false;
        };
        self.record_expansion(change);
        true
    }

    pub fn toggle_item_expansion(&mut self, id: &str) -> bool {
        let expanded = !self.expansion.is_expanded(id);
        self.set_item_expansion(id, expanded)
    }

    /// Expand every expandable, enabled sibling of `id` (and `id` itself).
    pub fn expand_all_siblings(&mut self, id: &str) -> bool {
        let Some(parent) = self.index.get(id).map(|node| node.parent.clone()) else {
            return false;
        };
        let siblings: Vec<NodeId> = self
            .index
            .children_ids(parent.as_deref())
            .iter()
            .filter(|sibling| {
                self.index
                    .get(sibling.as_str())
                    .is_some_and(|node| !node.disabled && node.is_expandable())
            })
            .cloned()
            .collect();

        let Some(change) = self
            .expansion
            .set_many(siblings.iter().map(NodeId::as_str), true)
        else {
            return false;
        };
        for toggled in &change.toggled {
            if self
                .index
                .get(toggled.as_str())
                .is_some_and(|node| node.needs_fetch())
            {
                self.queue_fetch(toggled.as_str());
            }
        }
        self.record_expansion(change);
        true
    }

    /// Host feedback for controlled expansion.
    pub fn sync_expanded<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        self.expansion.sync(ids);
        self.invalidate_view();
        self.repair_focus();
    }

    pub fn set_item_selection(&mut self, id: &str, selected: bool) -> bool {
        if !self.index.contains(id) || is_disabled_in(&self.index, id) {
            return false;
        }
        let change = self.selection.set_selected(&self.index, id, selected);
        self.record_selection(change)
    }

    /// Flat selection over the visible order, skipping disabled items.
    pub fn select_range(&mut self, from: &str, to: &str) -> bool {
        let visible = visible_in(&self.visible, &self.index, &self.expansion, &self.filter);
        let index = &self.index;
        let change = self
            .selection
            .select_range(visible, from, to, |id| is_disabled_in(index, id));
        self.record_selection(change)
    }

    pub fn select_all(&mut self) -> bool {
        let visible = visible_in(&self.visible, &self.index, &self.expansion, &self.filter);
        let index = &self.index;
        let change = self
            .selection
            .select_all(visible, |id| is_disabled_in(index, id));
        self.record_selection(change)
    }

    pub fn clear_selection(&mut self) -> bool {
        let change = self.selection.clear();
        self.record_selection(change)
    }

    pub fn set_selection_mode(&mut self, mode: SelectionMode) -> bool {
        self.navigation.clear_anchor();
        let change = self.selection.set_mode(mode);
        self.record_selection(change)
    }

    /// Host feedback for controlled selection.
    pub fn sync_selected<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        self.selection.sync(ids);
    }

    pub fn set_is_item_disabled(&mut self, id: &str, disabled: bool) -> bool {
        if !self.index.set_disabled(id, disabled) {
            return false;
        }
        self.events.push(TreeEvent::DisabledChanged {
            id: NodeId::from(id),
            disabled,
        });
        if disabled && self.editing.as_deref() == Some(id) {
            self.set_edited_item(None);
        }
        self.repair_focus();
        true
    }

    /// Enter edit mode for an editable item, or leave it with `None`.
    pub fn set_edited_item(&mut self, id: Option<&str>) -> bool {
        if let Some(id) = id
            && !self.is_item_editable(id)
        {
            return false;
        }
        if self.editing.as_deref() == id {
            return false;
        }
        self.editing = id.map(NodeId::from);
        self.events.push(TreeEvent::EditingChanged {
            id: self.editing.clone(),
        });
        true
    }

    /// Rename `id`; leaves edit mode when it was being edited.
    pub fn update_item_label(&mut self, id: &str, label: impl Into<CompactString>) -> bool {
        let label = label.into();
        if !self.index.set_label(id, label.clone()) {
            return false;
        }
        self.events.push(TreeEvent::LabelUpdated {
            id: NodeId::from(id),
            label,
        });
        if self.editing.as_deref() == Some(id) {
            self.editing = None;
            self.events.push(TreeEvent::EditingChanged { id: None });
        }
        if self.filter.search.is_some() {
            self.invalidate_view();
            self.repair_focus();
        }
        true
    }

    /// Replace the children of `parent` (or the roots). Duplicate ids are
    /// rejected and leave the tree unchanged.
    pub fn update_item_children(
        &mut self,
        parent: Option<&str>,
        items: &[TreeItem],
    ) -> TreeResult<bool> {
        self.update_item_children_with(parent, items, &DefaultAccessor)
    }

    pub fn update_item_children_with<T, A>(
        &mut self,
        parent: Option<&str>,
        items: &[T],
        accessor: &A,
    ) -> TreeResult<bool>
    where
        A: ItemAccessor<T> + ?Sized,
    {
        if !self.index.update_children(parent, items, accessor)? {
            return Ok(false);
        }
        self.after_structural_change(parent);
        Ok(true)
    }

    pub fn set_filter(&mut self, filter: ViewFilter) {
        self.filter = filter;
        self.invalidate_view();
        self.repair_focus();
    }

    #[must_use]
    pub fn propose_move(&self, id: &str, new_parent: Option<&str>, new_index: usize) -> bool {
        self.reorder
            .propose_move(&self.index, id, new_parent, new_index)
    }

    /// Apply a move. `Ok(false)` for unknown ids and same-position moves;
    /// cycles and vetoed moves are errors.
    pub fn commit_move(
        &mut self,
        id: &str,
        new_parent: Option<&str>,
        new_index: usize,
    ) -> TreeResult<bool> {
        let Some(request) = self
            .reorder
            .commit_move(&mut self.index, id, new_parent, new_index)?
        else {
            return Ok(false);
        };

        let touched: Vec<NodeId> = [request.old_parent.clone(), request.new_parent.clone()]
            .into_iter()
            .flatten()
            .collect();
        self.events.push(TreeEvent::ItemMoved(request));

        let change = self.selection.reconcile_parents(&self.index, &touched);
        self.record_selection(change);
        self.invalidate_view();
        self.repair_focus();
        Ok(true)
    }

    /// Drop the cached children of `id` and queue a fresh fetch.
    pub fn reload_children(&mut self, id: &str) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };
        if !self.index.contains(id) {
            return false;
        }
        cache.clear_cache_for_parent(Some(&NodeId::from(id)));
        self.queue_fetch(id);
        true
    }

    // ---------------------------------------------------------------------
    // I/O
    // ---------------------------------------------------------------------

    /// Fetch the top-level items through the data source and make them the roots.
    pub async fn load_root(&mut self) -> TreeResult<usize> {
        let Some(cache) = self.cache.clone() else {
            return Ok(0);
        };
        let loaded = cache.get_children(None).await;
        self.merge_loaded(None, loaded, &cache)
    }

    /// Run every queued effect. Fetches for different parents run concurrently;
    /// results are merged in queue order. A batch that fails to merge is
    /// dropped from the cache and does not stop the others; the first such
    /// error is returned once every result has been merged.
    pub async fn run_effects(&mut self) -> TreeResult<usize> {
        let Some(cache) = self.cache.clone() else {
            self.effects.clear();
            return Ok(0);
        };
        let parents: Vec<NodeId> = self
            .effects
            .drain(..)
            .map(|effect| match effect {
                Effect::FetchChildren(id) => id,
            })
            .collect();
        if parents.is_empty() {
            return Ok(0);
        }

        debug!(
            marker = "TREE_VIEW",
            operation_type = "run_effects",
            fetches = parents.len(),
            "Running queued fetches"
        );
        let results = join_all(parents.iter().map(|parent| cache.get_children(Some(parent)))).await;

        let mut first_error = None;
        for (parent, loaded) in parents.iter().zip(results) {
            if let Err(err) = self.merge_loaded(Some(parent), loaded, &cache) {
                warn!(
                    marker = "TREE_VIEW",
                    operation_type = err.operation_type(),
                    parent = %parent,
                    error = %err,
                    "Rejected fetched children"
                );
                cache.clear_cache_for_parent(Some(parent));
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(parents.len()),
        }
    }

    /// Merge fetched children into the index. A failed fetch becomes a single
    /// disabled placeholder child. Results for parents removed meanwhile are dropped.
    fn merge_loaded(
        &mut self,
        parent: Option<&NodeId>,
        loaded: Vec<LoadedItem>,
        cache: &LazyCache,
    ) -> TreeResult<usize> {
        let failure = match loaded.as_slice() {
            [only] if only.is_error_placeholder(parent) => only.meta.error_message.clone(),
            _ => None,
        };

        let items: Vec<TreeItem> = loaded
            .into_iter()
            .map(|loaded| {
                let mut item = loaded.item;
                if item.children_count.is_none() && item.children.is_empty() {
                    item.children_count = Some(cache.get_children_count(&item));
                }
                item
            })
            .collect();

        let parent_id = parent.map(NodeId::as_str);
        if !self.index.update_children(parent_id, &items, &DefaultAccessor)? {
            debug!(
                marker = "TREE_VIEW",
                operation_type = "discard_children",
                parent = ?parent,
                "Parent vanished before its children arrived"
            );
            return Ok(0);
        }

        match failure {
            Some(message) => {
                let err = TreeError::fetch(parent_id, &FetchError::new(message.clone()));
                warn!(
                    marker = "TREE_VIEW",
                    operation_type = err.operation_type(),
                    error = %err,
                    "Children unavailable, showing placeholder"
                );
                self.events.push(TreeEvent::ChildrenLoadFailed {
                    parent: parent.cloned(),
                    message,
                });
            }
            None => self.events.push(TreeEvent::ChildrenLoaded {
                parent: parent.cloned(),
                count: items.len(),
            }),
        }

        self.after_structural_change(parent_id);
        Ok(items.len())
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn queue_fetch(&mut self, id: &str) {
        if self.cache.is_none() {
            debug!(
                marker = "TREE_VIEW",
                operation_type = "fetch_without_source",
                id,
                "No data source; host must supply children"
            );
            return;
        }
        let effect = Effect::FetchChildren(NodeId::from(id));
        if !self.effects.contains(&effect) {
            self.effects.push_back(effect);
        }
    }

    fn record_expansion(&mut self, change: ExpansionChange) {
        for id in change.toggled {
            self.events.push(TreeEvent::ExpansionToggled {
                id,
                expanded: change.expanded,
            });
        }
        self.events.push(TreeEvent::ExpansionChanged {
            expanded: change.next,
        });
        self.invalidate_view();
        self.repair_focus();
    }

    fn record_selection(&mut self, change: Option<SelectionChange>) -> bool {
        let Some(change) = change else {
            return false;
        };
        self.events.push(TreeEvent::SelectionChanged {
            added: change.added,
            removed: change.removed,
            selected: change.next,
        });
        true
    }

    /// Re-validate id-keyed state after `parent`'s children were replaced.
    fn after_structural_change(&mut self, parent: Option<&str>) {
        self.expansion.prune(&self.index);
        self.selection.prune(&self.index);
        self.refetch_expanded_below(parent);

        // New children of a selected parent follow it when selection propagates.
        let propagation = self.selection.propagation();
        if let Some(parent) = parent
            && self.selection.is_selected(parent)
            && (propagation.descendants || propagation.parents)
        {
            let change = self.selection.set_selected(&self.index, parent, true);
            self.record_selection(change);
        } else if let Some(parent) = parent {
            let change = self
                .selection
                .reconcile_parents(&self.index, &[NodeId::from(parent)]);
            self.record_selection(change);
        }

        if let Some(editing) = &self.editing
            && !self.index.contains(editing)
        {
            self.editing = None;
            self.events.push(TreeEvent::EditingChanged { id: None });
        }

        self.invalidate_view();
        self.repair_focus();
    }

    /// Nodes that stayed expanded through a refresh lost their loaded
    /// children; fetch them again.
    fn refetch_expanded_below(&mut self, parent: Option<&str>) {
        let below = match parent {
            Some(parent) => self.index.descendant_ids(parent),
            None => self
                .index
                .root_ids()
                .iter()
                .flat_map(|root| {
                    std::iter::once(root.clone()).chain(self.index.descendant_ids(root))
                })
                .collect(),
        };
        for id in below {
            let stale = self.expansion.is_expanded(&id)
                && self.index.get(&id).is_some_and(|node| node.needs_fetch());
            if stale {
                self.queue_fetch(&id);
            }
        }
    }

    fn invalidate_view(&mut self) {
        self.visible.take();
    }

    fn repair_focus(&mut self) {
        let before = self.navigation.focused().cloned();
        let repaired = {
            nav_context!(self, ctx);
            self.navigation.repair_focus(&ctx)
        };
        if let Some(to) = repaired {
            self.events.push(TreeEvent::FocusChanged { from: before, to });
        }
    }
}

impl std::fmt::Debug for TreeView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeView")
            .field("nodes", &self.index.len())
            .field("expanded", &self.expansion.expanded_ids().len())
            .field("selected", &self.selection.selected_ids().len())
            .field("focused", &self.navigation.focused())
            .field("pending_effects", &self.effects.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::LazyLoadingConfig,
        model::{item::ChildrenCount, selection::Propagation},
        util::clock::ManualClock,
    };
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    fn ids(raw: &[&str]) -> Vec<NodeId> {
        raw.iter().copied().map(NodeId::from).collect()
    }

    fn sorted(set: &IdSet) -> Vec<&str> {
        let mut out: Vec<&str> = set.iter().map(NodeId::as_str).collect();
        out.sort_unstable();
        out
    }

    fn sample() -> Vec<TreeItem> {
        vec![
            TreeItem::new("1", "One")
                .child(TreeItem::new("1-1", "One One"))
                .child(TreeItem::new("1-2", "One Two")),
            TreeItem::new("2", "Two").child(TreeItem::new("2-1", "Two One")),
            TreeItem::new("3", "Three").disabled(true),
        ]
    }

    fn multi(propagation: Propagation) -> TreeConfig {
        let mut config = TreeConfig::default();
        config.selection.multi_select = true;
        config.selection.propagation = propagation;
        config
    }

    fn view(config: TreeConfig) -> TreeView {
        TreeView::builder()
            .config(config)
            .items(sample())
            .build()
            .expect("valid tree")
    }

    /// Lazy source: every fetched item may have children; parent "bad" fails.
    #[derive(Default)]
    struct LazySource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DataSource for LazySource {
        async fn get_tree_items(
            &self,
            parent: Option<&NodeId>,
        ) -> Result<Vec<TreeItem>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            match parent.map(NodeId::as_str) {
                None => Ok(vec![
                    TreeItem::new("a", "Alpha").with_children_count(ChildrenCount::Unknown),
                    TreeItem::new("bad", "Broken").with_children_count(ChildrenCount::Unknown),
                ]),
                Some("bad") => Err(FetchError::new("boom")),
                Some(parent) => Ok(vec![
                    TreeItem::new(format!("{parent}/x"), "X"),
                    TreeItem::new(format!("{parent}/y"), "Y"),
                ]),
            }
        }
    }

    fn lazy_view(source: Arc<LazySource>) -> TreeView {
        let mut config = TreeConfig::default();
        config.lazy_loading = LazyLoadingConfig {
            stale_time: Duration::from_secs(60),
            ..LazyLoadingConfig::default()
        };
        TreeView::builder()
            .config(config)
            .data_source(source)
            .clock(Arc::new(ManualClock::new()))
            .build()
            .expect("empty tree")
    }

    #[test]
    fn descendants_propagation_scenario() {
        let items = vec![
            TreeItem::leaf("1")
                .child(TreeItem::leaf("1-1"))
                .child(TreeItem::leaf("1-2")),
        ];
        let mut view = TreeView::builder()
            .config(multi(Propagation {
                descendants: true,
                parents: false,
            }))
            .items(items)
            .build()
            .expect("valid tree");

        assert!(view.set_item_selection("1", true));
        assert_eq!(sorted(view.selected_ids()), vec!["1", "1-1", "1-2"]);
    }

    #[test]
    fn control_surface_queries() {
        let view = view(TreeConfig::default());

        assert_eq!(view.get_parent_id("1-2").map(NodeId::as_str), Some("1"));
        assert_eq!(view.get_item_ordered_children_ids(Some("1")), ids(&["1-1", "1-2"]).as_slice());
        assert_eq!(view.get_item_ordered_children_ids(None), ids(&["1", "2", "3"]).as_slice());
        assert_eq!(view.get_item("2").map(|item| item.children.len()), Some(1));
        assert_eq!(view.get_item_tree(), sample());
        assert!(view.get_item("ghost").is_none());
        assert!(view.get_parent_id("ghost").is_none());
    }

    #[test]
    fn unknown_ids_are_no_ops_everywhere() {
        let mut view = view(TreeConfig::default());
        assert!(!view.focus_item("ghost"));
        assert!(!view.set_item_expansion("ghost", true));
        assert!(!view.set_item_selection("ghost", true));
        assert!(!view.set_is_item_disabled("ghost", true));
        assert!(!view.update_item_label("ghost", "x"));
        assert!(!view.set_edited_item(Some("ghost")));
        assert!(!view.update_item_children(Some("ghost"), &[]).unwrap());
        assert!(!view.commit_move("ghost", None, 0).unwrap());
        assert!(view.take_events().is_empty());
    }

    #[test]
    fn expansion_drives_visible_items_and_events() {
        let mut view = view(TreeConfig::default());
        assert_eq!(view.visible_items(), ids(&["1", "2", "3"]).as_slice());

        assert!(view.set_item_expansion("1", true));
        assert!(!view.set_item_expansion("1", true));
        assert_eq!(view.visible_items(), ids(&["1", "1-1", "1-2", "2", "3"]).as_slice());

        let events = view.take_events();
        assert_eq!(
            events[0],
            TreeEvent::ExpansionToggled {
                id: NodeId::from("1"),
                expanded: true
            }
        );
        assert!(matches!(events[1], TreeEvent::ExpansionChanged { .. }));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn disabled_items_reject_commands() {
        let mut view = view(multi(Propagation::default()));
        assert!(!view.set_item_selection("3", true));
        assert!(!view.focus_item("3"));

        assert!(view.set_is_item_disabled("2", true));
        assert!(!view.set_item_expansion("2", true));
        assert!(view.is_item_disabled("2"));
    }

    #[test]
    fn collapsing_moves_focus_to_visible_ancestor() {
        let mut view = view(TreeConfig::default());
        view.set_item_expansion("1", true);
        assert!(view.focus_item("1-2"));
        view.take_events();

        view.set_item_expansion("1", false);
        assert_eq!(view.focused_item().map(NodeId::as_str), Some("1"));
        assert!(view.take_events().contains(&TreeEvent::FocusChanged {
            from: Some(NodeId::from("1-2")),
            to: Some(NodeId::from("1")),
        }));
    }

    #[test]
    fn keyboard_range_selection_through_dispatch() {
        let mut view = view(multi(Propagation::default()));
        view.set_item_expansion("1", true);
        view.focus_item("1");

        view.dispatch(TreeAction::extend(NavCommand::Next)).unwrap();
        view.dispatch(TreeAction::extend(NavCommand::Next)).unwrap();
        assert_eq!(sorted(view.selected_ids()), vec!["1", "1-1", "1-2"]);
        assert_eq!(view.range_anchor().map(NodeId::as_str), Some("1"));

        view.dispatch(TreeAction::ReleaseModifier).unwrap();
        view.dispatch(TreeAction::navigate(NavCommand::Escape)).unwrap();
        assert!(view.selected_ids().is_empty());
        assert!(view.range_anchor().is_none());
    }

    #[test]
    fn activate_on_leaf_toggles_selection() {
        let mut view = view(TreeConfig::default());
        view.set_item_expansion("2", true);
        view.focus_item("2-1");

        view.dispatch(TreeAction::navigate(NavCommand::Activate)).unwrap();
        assert!(view.is_item_selected("2-1"));
        view.dispatch(TreeAction::navigate(NavCommand::Activate)).unwrap();
        assert!(!view.is_item_selected("2-1"));
    }

    #[test]
    fn select_all_skips_disabled() {
        let mut view = view(multi(Propagation::default()));
        view.dispatch(TreeAction::navigate(NavCommand::Home)).unwrap();
        view.dispatch(TreeAction::navigate(NavCommand::SelectAll)).unwrap();
        assert_eq!(sorted(view.selected_ids()), vec!["1", "2"]);
    }

    #[test]
    fn expand_all_siblings_skips_leaves_and_disabled() {
        let mut view = view(TreeConfig::default());
        view.focus_item("1");
        view.dispatch(TreeAction::navigate(NavCommand::ExpandAllSiblings))
            .unwrap();
        assert_eq!(sorted(view.expanded_ids()), vec!["1", "2"]);
    }

    #[test]
    fn controlled_expansion_waits_for_host_feedback() {
        let mut view = TreeView::builder()
            .items(sample())
            .expanded(Ownership::controlled(Vec::<NodeId>::new()))
            .build()
            .expect("valid tree");

        assert!(view.set_item_expansion("1", true));
        assert!(!view.is_item_expanded("1"));
        let next = view
            .take_events()
            .into_iter()
            .find_map(|event| match event {
                TreeEvent::ExpansionChanged { expanded } => Some(expanded),
                _ => None,
            })
            .expect("would-be set reported");

        view.sync_expanded(next);
        assert!(view.is_item_expanded("1"));
        assert_eq!(view.visible_items().len(), 5);
    }

    #[test]
    fn label_editing_requires_editable_item() {
        let mut view = TreeView::builder()
            .items(sample())
            .editable(|id| id.starts_with('1'))
            .build()
            .expect("valid tree");

        assert!(!view.set_edited_item(Some("2")));
        assert!(view.set_edited_item(Some("1")));
        assert_eq!(view.edited_item().map(NodeId::as_str), Some("1"));

        assert!(view.update_item_label("1", "Renamed"));
        assert!(view.edited_item().is_none());
        assert_eq!(view.get_item("1").map(|item| item.label), Some("Renamed".into()));
    }

    #[test]
    fn not_editable_without_predicate() {
        let mut view = view(TreeConfig::default());
        assert!(!view.set_edited_item(Some("1")));
        assert!(!view.set_edited_item(None));
    }

    #[test]
    fn update_children_prunes_dangling_state() {
        let mut view = view(multi(Propagation::default()));
        view.set_item_expansion("1", true);
        view.set_item_selection("1-2", true);
        view.focus_item("1-2");

        let replaced = view
            .update_item_children(Some("1"), &[TreeItem::leaf("1-9")])
            .expect("no duplicates");
        assert!(replaced);
        assert!(!view.is_item_selected("1-2"));
        // The removed node has no ancestor chain left to fall back on.
        assert!(view.focused_item().is_none());
        assert_eq!(view.visible_items(), ids(&["1", "1-9", "2", "3"]).as_slice());
    }

    #[test]
    fn update_children_rejects_duplicates_atomically() {
        let mut view = view(TreeConfig::default());
        let err = view
            .update_item_children(Some("1"), &[TreeItem::leaf("2")])
            .unwrap_err();
        assert!(matches!(err, TreeError::DuplicateId(_)));
        assert_eq!(view.get_item_ordered_children_ids(Some("1")), ids(&["1-1", "1-2"]).as_slice());
    }

    #[test]
    fn parents_propagation_survives_moves() {
        let mut view = TreeView::builder()
            .config(multi(Propagation {
                descendants: false,
                parents: true,
            }))
            .items(sample())
            .items_reordering(true)
            .build()
            .expect("valid tree");

        view.set_item_selection("1-1", true);
        assert!(!view.is_item_selected("1"));
        assert!(view.is_item_indeterminate("1"));

        // Moving the unselected child out leaves "1" fully selected.
        assert!(view.propose_move("1-2", Some("2"), 0));
        assert!(view.commit_move("1-2", Some("2"), 0).expect("allowed"));
        assert!(view.is_item_selected("1"));
        assert!(!view.is_item_selected("2"));
        assert_eq!(view.get_item_ordered_children_ids(Some("2")), ids(&["1-2", "2-1"]).as_slice());
    }

    #[test]
    fn removing_the_last_unselected_child_selects_the_parent() {
        let mut view = view(multi(Propagation {
            descendants: false,
            parents: true,
        }));
        view.set_item_selection("1-1", true);
        assert!(view.is_item_indeterminate("1"));

        assert!(view
            .update_item_children(Some("1"), &[TreeItem::new("1-1", "One One")])
            .expect("valid children"));
        assert!(view.is_item_selected("1"));
        assert!(!view.is_item_indeterminate("1"));
    }

    #[test]
    fn controlled_selection_reports_and_waits_for_the_host() {
        let mut view = TreeView::builder()
            .config(multi(Propagation::default()))
            .items(sample())
            .selected(Ownership::controlled(Vec::<NodeId>::new()))
            .build()
            .expect("valid tree");
        view.take_events();

        assert!(view.set_item_selection("2", true));
        assert!(!view.is_item_selected("2"));
        let requested = view
            .take_events()
            .into_iter()
            .find_map(|event| match event {
                TreeEvent::SelectionChanged { selected, .. } => Some(selected),
                _ => None,
            })
            .expect("selection reported");
        assert_eq!(sorted(&requested), vec!["2"]);

        view.sync_selected(requested.iter().cloned());
        assert!(view.is_item_selected("2"));
    }

    #[test]
    fn blur_drops_focus() {
        let mut view = view(TreeConfig::default());
        assert!(!view.blur());
        view.focus_item("2");
        view.take_events();

        view.dispatch(TreeAction::Blur).expect("blur");
        assert!(view.focused_item().is_none());
        assert_eq!(
            view.take_events(),
            vec![TreeEvent::FocusChanged {
                from: Some(NodeId::from("2")),
                to: None,
            }]
        );
    }

    #[test]
    fn moves_require_reordering_and_respect_cycles() {
        let mut view = view(TreeConfig::default());
        assert!(!view.propose_move("2", None, 0));

        let mut view = TreeView::builder()
            .items(sample())
            .items_reordering(true)
            .build()
            .expect("valid tree");
        let err = view.commit_move("1", Some("1-1"), 0).unwrap_err();
        assert!(matches!(err, TreeError::CycleDetected { .. }));
        assert!(!view.is_item_reorderable("3"));
    }

    #[test]
    fn search_filter_keeps_matches_and_ancestors() {
        let mut view = view(TreeConfig::default());
        view.set_item_expansion("1", true);
        view.focus_item("2");

        view.set_filter(ViewFilter::default().search("two"));
        assert_eq!(view.visible_items(), ids(&["1", "1-2", "2"]).as_slice());
        assert_eq!(view.focused_item().map(NodeId::as_str), Some("2"));

        view.set_filter(ViewFilter::default().hide("2"));
        assert!(view.focused_item().is_none());
    }

    #[tokio::test]
    async fn lazy_expansion_fetches_through_effects() {
        let source = Arc::new(LazySource::default());
        let mut view = lazy_view(Arc::clone(&source));

        assert_eq!(view.load_root().await.expect("roots"), 2);
        assert_eq!(view.visible_items(), ids(&["a", "bad"]).as_slice());

        assert!(view.set_item_expansion("a", true));
        assert_eq!(
            view.pending_effects().cloned().collect::<Vec<_>>(),
            vec![Effect::FetchChildren(NodeId::from("a"))]
        );
        assert_eq!(view.run_effects().await.expect("merge"), 1);
        assert_eq!(view.visible_items(), ids(&["a", "a/x", "a/y", "bad"]).as_slice());
        assert_eq!(view.load_state("a"), Some(EntryState::Loaded));
        assert!(view.take_events().contains(&TreeEvent::ChildrenLoaded {
            parent: Some(NodeId::from("a")),
            count: 2,
        }));

        // Collapse and re-expand within the stale window: children are already indexed.
        view.set_item_expansion("a", false);
        view.set_item_expansion("a", true);
        assert_eq!(view.run_effects().await.expect("nothing queued"), 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_fetch_shows_placeholder_and_can_retry() {
        let source = Arc::new(LazySource::default());
        let mut view = lazy_view(source);
        view.load_root().await.expect("roots");

        view.set_item_expansion("bad", true);
        view.run_effects().await.expect("placeholder merge");

        let placeholder = NodeId::error_placeholder(Some("bad"));
        assert_eq!(view.get_item_ordered_children_ids(Some("bad")), &[placeholder.clone()]);
        assert!(view.is_item_disabled(&placeholder));
        assert_eq!(view.load_state("bad"), Some(EntryState::Error));
        assert!(view.take_events().contains(&TreeEvent::ChildrenLoadFailed {
            parent: Some(NodeId::from("bad")),
            message: "boom".into(),
        }));

        assert!(view.reload_children("bad"));
        assert_eq!(view.pending_effects().count(), 1);
    }

    #[tokio::test]
    async fn refreshing_roots_refetches_expanded_children() {
        let source = Arc::new(LazySource::default());
        let mut view = lazy_view(source);
        view.load_root().await.expect("roots");
        view.set_item_expansion("a", true);
        view.run_effects().await.expect("merge");

        view.load_root().await.expect("refresh");
        assert!(view.is_item_expanded("a"));
        assert_eq!(
            view.pending_effects().cloned().collect::<Vec<_>>(),
            vec![Effect::FetchChildren(NodeId::from("a"))]
        );
        view.run_effects().await.expect("merge");
        assert_eq!(view.visible_items(), ids(&["a", "a/x", "a/y", "bad"]).as_slice());
    }

    /// Roots "a" and "b"; the children of "a" reuse the id "b".
    struct ClashingSource;

    #[async_trait]
    impl DataSource for ClashingSource {
        async fn get_tree_items(
            &self,
            parent: Option<&NodeId>,
        ) -> Result<Vec<TreeItem>, FetchError> {
            Ok(match parent.map(NodeId::as_str) {
                None => vec![
                    TreeItem::new("a", "A").with_children_count(ChildrenCount::Unknown),
                    TreeItem::new("b", "B").with_children_count(ChildrenCount::Unknown),
                ],
                Some("a") => vec![TreeItem::new("b", "Clash")],
                Some(parent) => vec![TreeItem::new(format!("{parent}/x"), "X")],
            })
        }
    }

    #[tokio::test]
    async fn rejected_batch_does_not_lose_the_others() {
        let mut view = TreeView::builder()
            .data_source(Arc::new(ClashingSource))
            .build()
            .expect("empty tree");
        view.load_root().await.expect("roots");
        view.set_item_expansion("a", true);
        view.set_item_expansion("b", true);

        let err = view.run_effects().await.unwrap_err();
        assert!(matches!(err, TreeError::DuplicateId(_)));
        assert_eq!(view.get_item_ordered_children_ids(Some("b")), ids(&["b/x"]).as_slice());
        assert!(view.get_item_ordered_children_ids(Some("a")).is_empty());
        assert_eq!(view.load_state("a"), None);

        // Asking again for the still-empty expanded node retries the fetch.
        assert!(!view.set_item_expansion("a", true));
        assert_eq!(
            view.pending_effects().cloned().collect::<Vec<_>>(),
            vec![Effect::FetchChildren(NodeId::from("a"))]
        );
    }

    /// "p" has one disabled child "q" whose own children cannot be fetched.
    struct FailingGrandchildSource;

    #[async_trait]
    impl DataSource for FailingGrandchildSource {
        async fn get_tree_items(
            &self,
            parent: Option<&NodeId>,
        ) -> Result<Vec<TreeItem>, FetchError> {
            match parent.map(NodeId::as_str) {
                None => Ok(vec![
                    TreeItem::new("p", "P").with_children_count(ChildrenCount::Unknown),
                ]),
                Some("p") => Ok(vec![
                    TreeItem::new("q", "Q")
                        .disabled(true)
                        .with_children_count(ChildrenCount::Unknown),
                ]),
                Some(_) => Err(FetchError::new("offline")),
            }
        }
    }

    #[tokio::test]
    async fn failed_grandchild_is_not_mistaken_for_a_failed_parent() {
        let mut view = TreeView::builder()
            .data_source(Arc::new(FailingGrandchildSource))
            .build()
            .expect("empty tree");
        view.load_root().await.expect("roots");
        view.set_item_expansion("p", true);
        view.run_effects().await.expect("merge p");
        assert!(view.reload_children("q"));
        view.run_effects().await.expect("placeholder merge");
        assert_eq!(view.load_state("q"), Some(EntryState::Error));
        view.take_events();

        assert!(view.reload_children("p"));
        view.run_effects().await.expect("merge p again");

        let events = view.take_events();
        assert!(events.contains(&TreeEvent::ChildrenLoaded {
            parent: Some(NodeId::from("p")),
            count: 1,
        }));
        assert!(!events
            .iter()
            .any(|event| matches!(event, TreeEvent::ChildrenLoadFailed { .. })));
        assert_eq!(view.get_item_ordered_children_ids(Some("p")), ids(&["q"]).as_slice());
    }

    #[tokio::test]
    async fn selected_parent_passes_selection_to_loaded_children() {
        let source = Arc::new(LazySource::default());
        let mut config = multi(Propagation {
            descendants: true,
            parents: false,
        });
        config.lazy_loading.stale_time = Duration::from_secs(60);
        let mut view = TreeView::builder()
            .config(config)
            .data_source(source)
            .build()
            .expect("empty tree");
        view.load_root().await.expect("roots");

        view.set_item_selection("a", true);
        view.set_item_expansion("a", true);
        view.run_effects().await.expect("merge");

        assert_eq!(sorted(view.selected_ids()), vec!["a", "a/x", "a/y"]);
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let mut view = view(TreeConfig::default());
        let mut rx = view.subscribe();
        view.focus_item("1");

        assert_eq!(
            rx.recv().await,
            Some(TreeEvent::FocusChanged {
                from: None,
                to: Some(NodeId::from("1")),
            })
        );
    }

    #[test]
    fn custom_accessor_builds_the_index() {
        struct Row {
            key: u32,
            rows: Vec<Row>,
        }
        let rows = vec![Row {
            key: 1,
            rows: vec![Row {
                key: 2,
                rows: Vec::new(),
            }],
        }];
        let accessor = crate::model::item::FnAccessor::<Row>::new(
            |row| NodeId::from(row.key.to_string()),
            |row| CompactString::from(format!("Row {}", row.key)),
            |row| row.rows.as_slice(),
        );

        let view = TreeView::builder()
            .items_with(&rows, &accessor)
            .build()
            .expect("valid rows");
        assert_eq!(view.get_parent_id("2").map(NodeId::as_str), Some("1"));
        assert_eq!(view.get_item("2").map(|item| item.label), Some("Row 2".into()));
    }
}
