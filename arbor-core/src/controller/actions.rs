//! src/controller/actions.rs
//! ============================================================================
//! # Actions: Commands Accepted by the Tree View
//!
//! `TreeAction` is the single input type for [`TreeView::dispatch`], so hosts
//! can translate raw input into one enum and queue it. `Effect` is the output
//! side: I/O the state engine asked for but never runs inline.
//!
//! [`TreeView::dispatch`]: crate::controller::tree_view::TreeView::dispatch

use compact_str::CompactString;

use crate::{
    controller::navigation::{Modifiers, NavCommand},
    model::item::NodeId,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeAction {
    /// Keyboard-style navigation over the visible order.
    Navigate {
        command: NavCommand,
        modifiers: Modifiers,
    },

    /// The range-extension modifier was released.
    ReleaseModifier,

    FocusItem(NodeId),

    /// The tree lost focus.
    Blur,

    SetExpansion {
        id: NodeId,
        expanded: bool,
    },

    ToggleExpansion(NodeId),

    SetSelection {
        id: NodeId,
        selected: bool,
    },

    SelectRange {
        from: NodeId,
        to: NodeId,
    },

    ClearSelection,

    SetDisabled {
        id: NodeId,
        disabled: bool,
    },

    SetEditedItem(Option<NodeId>),

    UpdateLabel {
        id: NodeId,
        label: CompactString,
    },

    MoveItem {
        id: NodeId,
        new_parent: Option<NodeId>,
        new_index: usize,
    },

    /// Drop the cached children of `id` and fetch them again.
    ReloadChildren(NodeId),
}

impl TreeAction {
    #[must_use]
    pub const fn navigate(command: NavCommand) -> Self {
        Self::Navigate {
            command,
            modifiers: Modifiers::NONE,
        }
    }

    #[must_use]
    pub const fn extend(command: NavCommand) -> Self {
        Self::Navigate {
            command,
            modifiers: Modifiers::SHIFT,
        }
    }
}

/// Deferred I/O requested by a command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Effect {
    FetchChildren(NodeId),
}
