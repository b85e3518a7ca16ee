//! `src/controller/navigation.rs`
//! ============================================================================
//! # Navigation: Focus State Machine over the Visible Order
//!
//! The only state is the focused id and the range anchor. Commands move focus
//! directly and return [`NavIntent`]s for everything that belongs to another
//! store (expansion, selection); the caller applies those through the stores'
//! own commands.

use compact_str::CompactString;
use tracing::debug;

use crate::{
    config::NavigationConfig,
    model::{item::NodeId, tree_index::TreeIndex},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    Next,
    Previous,
    /// Right: expand a collapsed parent, or step into the first child.
    ExpandOrFirstChild,
    /// Left: collapse an expanded parent, or step out to the parent.
    CollapseOrParent,
    Home,
    End,
    PageUp,
    PageDown,
    Activate,
    Escape,
    TypeAhead(char),
    ExpandAllSiblings,
    SelectAll,
}

impl NavCommand {
    /// Commands that extend a range selection while shift is held.
    #[must_use]
    pub const fn is_range_extensible(self) -> bool {
        matches!(
            self,
            Self::Next | Self::Previous | Self::Home | Self::End | Self::PageUp | Self::PageDown
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Self = Self { shift: false };
    pub const SHIFT: Self = Self { shift: true };
}

/// Side effect the caller must route to the owning store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavIntent {
    /// Focus already moved here; reported for the event stream.
    Focus(NodeId),
    SetExpanded { id: NodeId, expanded: bool },
    ExpandSiblings(NodeId),
    ToggleSelection(NodeId),
    SelectRange { anchor: NodeId, to: NodeId },
    SelectAll,
    ClearSelection,
}

/// Read-only view of the tree a command is evaluated against.
pub struct NavContext<'a> {
    pub visible: &'a [NodeId],
    pub index: &'a TreeIndex,
    pub is_expanded: &'a dyn Fn(&str) -> bool,
    pub config: &'a NavigationConfig,
    pub multi_select: bool,
}

impl NavContext<'_> {
    fn is_disabled(&self, id: &str) -> bool {
        self.index.get(id).is_some_and(|node| node.disabled)
    }

    #[must_use]
    pub fn is_focusable(&self, id: &str) -> bool {
        self.index.contains(id) && (self.config.disabled_items_focusable || !self.is_disabled(id))
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.visible.iter().position(|visible| visible.as_str() == id)
    }

    fn first_focusable(&self, mut range: impl Iterator<Item = usize>) -> Option<usize> {
        range.find(|&i| self.is_focusable(self.visible[i].as_str()))
    }

    fn can_expand(&self, id: &str) -> bool {
        self.index
            .get(id)
            .is_some_and(|node| !node.disabled && node.is_expandable())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationState {
    focused: Option<NodeId>,
    range_anchor: Option<NodeId>,
}

impl NavigationState {
    #[must_use]
    pub const fn focused(&self) -> Option<&NodeId> {
        self.focused.as_ref()
    }

    #[must_use]
    pub const fn range_anchor(&self) -> Option<&NodeId> {
        self.range_anchor.as_ref()
    }

    /// Focus `id` if it is visible and focusable.
    pub fn focus(&mut self, id: &str, ctx: &NavContext<'_>) -> bool {
        if ctx.position(id).is_none() || !ctx.is_focusable(id) {
            return false;
        }
        if self.focused.as_deref() == Some(id) {
            return false;
        }
        self.focused = Some(NodeId::from(id));
        true
    }

    pub fn blur(&mut self) -> Option<NodeId> {
        self.range_anchor = None;
        self.focused.take()
    }

    /// The extension modifier was released; the gesture is over.
    pub fn release_modifier(&mut self) {
        self.range_anchor = None;
    }

    pub fn clear_anchor(&mut self) {
        self.range_anchor = None;
    }

    /// Evaluate one command. Focus moves in place; the rest comes back as intents.
    pub fn apply(
        &mut self,
        command: NavCommand,
        modifiers: Modifiers,
        ctx: &NavContext<'_>,
    ) -> Vec<NavIntent> {
        let mut intents = Vec::new();
        let current = self
            .focused
            .as_ref()
            .and_then(|id| ctx.position(id.as_str()));

        let target = match command {
            NavCommand::Next => match current {
                Some(i) => ctx.first_focusable(i + 1..ctx.visible.len()),
                None => ctx.first_focusable(0..ctx.visible.len()),
            },
            NavCommand::Previous => match current {
                Some(i) => ctx.first_focusable((0..i).rev()),
                None => ctx.first_focusable((0..ctx.visible.len()).rev()),
            },
            NavCommand::Home => ctx.first_focusable(0..ctx.visible.len()),
            NavCommand::End => ctx.first_focusable((0..ctx.visible.len()).rev()),
            NavCommand::PageDown => page_target(ctx, current, true),
            NavCommand::PageUp => page_target(ctx, current, false),
            NavCommand::TypeAhead(ch) => {
                if ctx.config.type_ahead {
                    type_ahead_target(ctx, current, ch)
                } else {
                    None
                }
            }
            NavCommand::ExpandOrFirstChild => {
                let Some(i) = current else {
                    return intents;
                };
                let id = &ctx.visible[i];
                if !ctx.can_expand(id) {
                    return intents;
                }
                if !(ctx.is_expanded)(id.as_str()) {
                    intents.push(NavIntent::SetExpanded {
                        id: id.clone(),
                        expanded: true,
                    });
                    return intents;
                }
                // Children may still be loading; then there is nothing to step into.
                ctx.visible
                    .get(i + 1)
                    .filter(|next| ctx.index.parent_id(next.as_str()) == Some(id))
                    .filter(|next| ctx.is_focusable(next.as_str()))
                    .map(|_| i + 1)
            }
            NavCommand::CollapseOrParent => {
                let Some(i) = current else {
                    return intents;
                };
                let id = &ctx.visible[i];
                if ctx.can_expand(id) && (ctx.is_expanded)(id.as_str()) {
                    intents.push(NavIntent::SetExpanded {
                        id: id.clone(),
                        expanded: false,
                    });
                    return intents;
                }
                ctx.index
                    .parent_id(id.as_str())
                    .and_then(|parent| ctx.position(parent.as_str()))
                    .filter(|&p| ctx.is_focusable(ctx.visible[p].as_str()))
            }
            NavCommand::Activate => {
                if let Some(id) = current.map(|i| &ctx.visible[i])
                    && !ctx.is_disabled(id)
                {
                    if ctx.can_expand(id) {
                        intents.push(NavIntent::SetExpanded {
                            id: id.clone(),
                            expanded: !(ctx.is_expanded)(id.as_str()),
                        });
                    } else {
                        intents.push(NavIntent::ToggleSelection(id.clone()));
                    }
                }
                return intents;
            }
            NavCommand::Escape => {
                self.range_anchor = None;
                if ctx.multi_select {
                    intents.push(NavIntent::ClearSelection);
                }
                return intents;
            }
            NavCommand::ExpandAllSiblings => {
                if let Some(i) = current {
                    intents.push(NavIntent::ExpandSiblings(ctx.visible[i].clone()));
                }
                return intents;
            }
            NavCommand::SelectAll => {
                if ctx.multi_select {
                    intents.push(NavIntent::SelectAll);
                }
                return intents;
            }
        };

        let Some(target) = target else {
            return intents;
        };
        let previous = self.focused.clone();
        let next = ctx.visible[target].clone();

        let extending = modifiers.shift && ctx.multi_select && command.is_range_extensible();
        if extending {
            if let Some(previous) = &previous
                && self.range_anchor.is_none()
            {
                self.range_anchor = Some(previous.clone());
            }
        } else {
            self.range_anchor = None;
        }

        if previous.as_ref() != Some(&next) {
            debug!(
                marker = "NAVIGATION",
                operation_type = "focus_move",
                command = ?command,
                from = ?previous,
                to = %next,
                "Focus moved"
            );
            self.focused = Some(next.clone());
            intents.push(NavIntent::Focus(next.clone()));
        }

        if extending && let Some(anchor) = &self.range_anchor {
            intents.push(NavIntent::SelectRange {
                anchor: anchor.clone(),
                to: next.clone(),
            });
        }

        if ctx.config.auto_expand_on_navigation
            && ctx.can_expand(&next)
            && !(ctx.is_expanded)(next.as_str())
        {
            intents.push(NavIntent::SetExpanded {
                id: next,
                expanded: true,
            });
        }

        intents
    }

    /// Keep focus on a visible, focusable node after a structural or
    /// expansion change: fall back to the nearest such ancestor, else clear.
    /// Returns the new focus when it changed.
    pub fn repair_focus(&mut self, ctx: &NavContext<'_>) -> Option<Option<NodeId>> {
        if let Some(anchor) = &self.range_anchor
            && !ctx.index.contains(anchor)
        {
            self.range_anchor = None;
        }

        let focused = self.focused.clone()?;
        if ctx.position(&focused).is_some() && ctx.is_focusable(&focused) {
            return None;
        }

        let replacement = ctx
            .index
            .ancestor_chain(&focused)
            .into_iter()
            .find(|ancestor| ctx.position(ancestor).is_some() && ctx.is_focusable(ancestor));

        debug!(
            marker = "NAVIGATION",
            operation_type = "repair_focus",
            lost = %focused,
            replacement = ?replacement,
            "Focused node no longer reachable"
        );
        self.focused.clone_from(&replacement);
        Some(replacement)
    }
}

/// Page step from `current`, clamped, then the nearest focusable row,
/// preferring the direction of travel.
fn page_target(ctx: &NavContext<'_>, current: Option<usize>, down: bool) -> Option<usize> {
    let len = ctx.visible.len();
    if len == 0 {
        return None;
    }
    let page = ctx.config.page_size.max(1);
    let start = current.unwrap_or(if down { 0 } else { len - 1 });

    if down {
        let landing = (start + page).min(len - 1);
        ctx.first_focusable(landing..len)
            .or_else(|| ctx.first_focusable((start + 1..landing).rev()))
    } else {
        let landing = start.saturating_sub(page);
        ctx.first_focusable((0..=landing).rev())
            .or_else(|| ctx.first_focusable(landing + 1..start))
    }
}

/// Next visible row after `current` whose label starts with `ch`, wrapping.
fn type_ahead_target(ctx: &NavContext<'_>, current: Option<usize>, ch: char) -> Option<usize> {
    let len = ctx.visible.len();
    let start = current.map_or(0, |i| i + 1);
    let needle: CompactString = ch.to_lowercase().collect();

    (0..len).map(|offset| (start + offset) % len).find(|&i| {
        let id = ctx.visible[i].as_str();
        ctx.is_focusable(id)
            && ctx
                .index
                .get(id)
                .is_some_and(|node| node.label.to_lowercase().starts_with(needle.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        item::{DefaultAccessor, TreeItem},
        tree_index::ViewFilter,
    };
    use ahash::AHashSet;
    use pretty_assertions::assert_eq;

    struct Fixture {
        index: TreeIndex,
        expanded: AHashSet<&'static str>,
        config: NavigationConfig,
        multi_select: bool,
    }

    impl Fixture {
        fn new() -> Self {
            let items = vec![
                TreeItem::new("fruits", "Fruits")
                    .child(TreeItem::new("apple", "Apple"))
                    .child(TreeItem::new("banana", "Banana").disabled(true))
                    .child(TreeItem::new("cherry", "Cherry")),
                TreeItem::new("veg", "Vegetables").child(TreeItem::new("carrot", "Carrot")),
                TreeItem::new("bread", "Bread"),
            ];
            Self {
                index: TreeIndex::build(&items, &DefaultAccessor).expect("valid tree"),
                expanded: ["fruits"].into_iter().collect(),
                config: NavigationConfig::default(),
                multi_select: true,
            }
        }

        fn run(&self, state: &mut NavigationState, command: NavCommand, modifiers: Modifiers) -> Vec<NavIntent> {
            let is_expanded = |id: &str| self.expanded.contains(id);
            let visible = self.index.flatten(is_expanded, &ViewFilter::default());
            let ctx = NavContext {
                visible: &visible,
                index: &self.index,
                is_expanded: &is_expanded,
                config: &self.config,
                multi_select: self.multi_select,
            };
            state.apply(command, modifiers, &ctx)
        }

        fn focused_at(&self, id: &str) -> NavigationState {
            NavigationState {
                focused: Some(NodeId::from(id)),
                range_anchor: None,
            }
        }
    }

    fn focused(state: &NavigationState) -> Option<&str> {
        state.focused().map(NodeId::as_str)
    }

    #[test]
    fn next_skips_disabled_and_clamps_at_end() {
        let fx = Fixture::new();
        let mut state = fx.focused_at("apple");

        fx.run(&mut state, NavCommand::Next, Modifiers::NONE);
        assert_eq!(focused(&state), Some("cherry"));

        let mut state = fx.focused_at("bread");
        assert!(fx.run(&mut state, NavCommand::Next, Modifiers::NONE).is_empty());
        assert_eq!(focused(&state), Some("bread"));
    }

    #[test]
    fn unfocused_tree_starts_at_either_end() {
        let fx = Fixture::new();
        let mut state = NavigationState::default();
        fx.run(&mut state, NavCommand::Next, Modifiers::NONE);
        assert_eq!(focused(&state), Some("fruits"));

        let mut state = NavigationState::default();
        fx.run(&mut state, NavCommand::Previous, Modifiers::NONE);
        assert_eq!(focused(&state), Some("bread"));
    }

    #[test]
    fn disabled_items_focusable_when_configured() {
        let mut fx = Fixture::new();
        fx.config.disabled_items_focusable = true;
        let mut state = fx.focused_at("apple");

        fx.run(&mut state, NavCommand::Next, Modifiers::NONE);
        assert_eq!(focused(&state), Some("banana"));
        // Focusable, but still inert.
        assert!(fx.run(&mut state, NavCommand::Activate, Modifiers::NONE).is_empty());
    }

    #[test]
    fn right_expands_collapsed_then_enters_first_child() {
        let mut fx = Fixture::new();
        let mut state = fx.focused_at("veg");

        let intents = fx.run(&mut state, NavCommand::ExpandOrFirstChild, Modifiers::NONE);
        assert_eq!(
            intents,
            vec![NavIntent::SetExpanded {
                id: NodeId::from("veg"),
                expanded: true
            }]
        );
        assert_eq!(focused(&state), Some("veg"));

        fx.expanded.insert("veg");
        fx.run(&mut state, NavCommand::ExpandOrFirstChild, Modifiers::NONE);
        assert_eq!(focused(&state), Some("carrot"));
    }

    #[test]
    fn left_collapses_then_moves_to_parent() {
        let fx = Fixture::new();
        let mut state = fx.focused_at("cherry");
        fx.run(&mut state, NavCommand::CollapseOrParent, Modifiers::NONE);
        assert_eq!(focused(&state), Some("fruits"));

        let intents = fx.run(&mut state, NavCommand::CollapseOrParent, Modifiers::NONE);
        assert_eq!(
            intents,
            vec![NavIntent::SetExpanded {
                id: NodeId::from("fruits"),
                expanded: false
            }]
        );

        let mut root = fx.focused_at("bread");
        assert!(fx.run(&mut root, NavCommand::CollapseOrParent, Modifiers::NONE).is_empty());
    }

    #[test]
    fn home_end_and_paging_clamp() {
        let mut fx = Fixture::new();
        fx.config.page_size = 2;
        let mut state = fx.focused_at("apple");

        fx.run(&mut state, NavCommand::End, Modifiers::NONE);
        assert_eq!(focused(&state), Some("bread"));
        fx.run(&mut state, NavCommand::Home, Modifiers::NONE);
        assert_eq!(focused(&state), Some("fruits"));

        // fruits(0) + 2 lands on banana (disabled), so the next row wins.
        fx.run(&mut state, NavCommand::PageDown, Modifiers::NONE);
        assert_eq!(focused(&state), Some("cherry"));
        fx.run(&mut state, NavCommand::PageDown, Modifiers::NONE);
        assert_eq!(focused(&state), Some("bread"));
        fx.run(&mut state, NavCommand::PageUp, Modifiers::NONE);
        assert_eq!(focused(&state), Some("cherry"));
    }

    #[test]
    fn activate_toggles_expansion_or_selection() {
        let fx = Fixture::new();
        let mut parent = fx.focused_at("fruits");
        assert_eq!(
            fx.run(&mut parent, NavCommand::Activate, Modifiers::NONE),
            vec![NavIntent::SetExpanded {
                id: NodeId::from("fruits"),
                expanded: false
            }]
        );

        let mut leaf = fx.focused_at("apple");
        assert_eq!(
            fx.run(&mut leaf, NavCommand::Activate, Modifiers::NONE),
            vec![NavIntent::ToggleSelection(NodeId::from("apple"))]
        );
    }

    #[test]
    fn shift_navigation_anchors_and_selects_range() {
        let fx = Fixture::new();
        let mut state = fx.focused_at("fruits");

        fx.run(&mut state, NavCommand::Next, Modifiers::SHIFT);
        let intents = fx.run(&mut state, NavCommand::Next, Modifiers::SHIFT);

        assert_eq!(state.range_anchor().map(NodeId::as_str), Some("fruits"));
        assert_eq!(
            intents,
            vec![
                NavIntent::Focus(NodeId::from("cherry")),
                NavIntent::SelectRange {
                    anchor: NodeId::from("fruits"),
                    to: NodeId::from("cherry")
                }
            ]
        );

        state.release_modifier();
        assert!(state.range_anchor().is_none());
    }

    #[test]
    fn escape_clears_anchor_and_selection_in_multi_mode() {
        let mut fx = Fixture::new();
        let mut state = fx.focused_at("fruits");
        fx.run(&mut state, NavCommand::Next, Modifiers::SHIFT);

        let intents = fx.run(&mut state, NavCommand::Escape, Modifiers::NONE);
        assert_eq!(intents, vec![NavIntent::ClearSelection]);
        assert!(state.range_anchor().is_none());

        fx.multi_select = false;
        assert!(fx.run(&mut state, NavCommand::Escape, Modifiers::NONE).is_empty());
    }

    #[test]
    fn auto_expand_on_landing() {
        let mut fx = Fixture::new();
        fx.config.auto_expand_on_navigation = true;
        let mut state = fx.focused_at("cherry");

        let intents = fx.run(&mut state, NavCommand::Next, Modifiers::NONE);
        assert_eq!(
            intents,
            vec![
                NavIntent::Focus(NodeId::from("veg")),
                NavIntent::SetExpanded {
                    id: NodeId::from("veg"),
                    expanded: true
                }
            ]
        );
    }

    #[test]
    fn type_ahead_wraps_and_ignores_case() {
        let fx = Fixture::new();
        let mut state = fx.focused_at("cherry");

        fx.run(&mut state, NavCommand::TypeAhead('b'), Modifiers::NONE);
        assert_eq!(focused(&state), Some("bread"));
        fx.run(&mut state, NavCommand::TypeAhead('F'), Modifiers::NONE);
        assert_eq!(focused(&state), Some("fruits"));
        // "Banana" is disabled, so 'b' from the top goes to "Bread" again.
        fx.run(&mut state, NavCommand::TypeAhead('b'), Modifiers::NONE);
        assert_eq!(focused(&state), Some("bread"));
    }

    #[test]
    fn repair_focus_climbs_to_visible_ancestor() {
        let mut fx = Fixture::new();
        let mut state = fx.focused_at("cherry");
        fx.expanded.clear();

        let is_expanded = |id: &str| fx.expanded.contains(id);
        let visible = fx.index.flatten(is_expanded, &ViewFilter::default());
        let ctx = NavContext {
            visible: &visible,
            index: &fx.index,
            is_expanded: &is_expanded,
            config: &fx.config,
            multi_select: true,
        };

        assert_eq!(state.repair_focus(&ctx), Some(Some(NodeId::from("fruits"))));
        assert_eq!(state.repair_focus(&ctx), None);
    }
}
