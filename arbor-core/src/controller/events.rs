//! `src/controller/events.rs`
//! ============================================================================
//! # Tree Events: Ordered Output Stream
//!
//! Every observable state change is recorded as a [`TreeEvent`]. Hosts either
//! drain the queue after a batch of commands or subscribe to a channel; both
//! see the same order. Announcement text, rendering and similar presentation
//! concerns are built on top of this stream.

use std::collections::VecDeque;

use compact_str::CompactString;
use tokio::sync::mpsc;

use crate::{
    controller::reorder::MoveRequest,
    model::{item::NodeId, ownership::IdSet},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    /// One node flipped expansion state.
    ExpansionToggled { id: NodeId, expanded: bool },

    /// The full resulting expansion set. Controlled hosts feed it back.
    ExpansionChanged { expanded: IdSet },

    SelectionChanged {
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
        selected: IdSet,
    },

    FocusChanged {
        from: Option<NodeId>,
        to: Option<NodeId>,
    },

    ItemMoved(MoveRequest),

    LabelUpdated { id: NodeId, label: CompactString },

    DisabledChanged { id: NodeId, disabled: bool },

    EditingChanged { id: Option<NodeId> },

    /// `parent: None` is the root level.
    ChildrenLoaded { parent: Option<NodeId>, count: usize },

    ChildrenLoadFailed {
        parent: Option<NodeId>,
        message: CompactString,
    },
}

impl TreeEvent {
    /// Static name used as the `operation_type` log field.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ExpansionToggled { .. } => "expansion_toggled",
            Self::ExpansionChanged { .. } => "expansion_changed",
            Self::SelectionChanged { .. } => "selection_changed",
            Self::FocusChanged { .. } => "focus_changed",
            Self::ItemMoved(_) => "item_moved",
            Self::LabelUpdated { .. } => "label_updated",
            Self::DisabledChanged { .. } => "disabled_changed",
            Self::EditingChanged { .. } => "editing_changed",
            Self::ChildrenLoaded { .. } => "children_loaded",
            Self::ChildrenLoadFailed { .. } => "children_load_failed",
        }
    }
}

/// Pending events plus live subscribers.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<TreeEvent>,
    subscribers: Vec<mpsc::UnboundedSender<TreeEvent>>,
}

impl EventQueue {
    pub fn push(&mut self, event: TreeEvent) {
        tracing::trace!(
            marker = "TREE_EVENT",
            operation_type = event.kind(),
            subscribers = self.subscribers.len(),
            "Queued tree event"
        );
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
        self.pending.push_back(event);
    }

    /// Drain everything queued so far, oldest first.
    pub fn drain(&mut self) -> Vec<TreeEvent> {
        self.pending.drain(..).collect()
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TreeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
