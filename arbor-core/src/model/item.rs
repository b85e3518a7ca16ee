//! `src/model/item.rs`
//! ============================================================================
//! # Items: Input Structure and Identifiers
//!
//! `TreeItem` is the nested `{id, label, children}` shape hosts hand to the
//! index. Hosts with their own item types plug in through [`ItemAccessor`].

use std::{borrow::Borrow, fmt, ops::Deref};

use compact_str::{CompactString, format_compact};
use serde::{Deserialize, Serialize};

/// Unique identifier of a node across the whole tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(CompactString);

impl NodeId {
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(CompactString::from(id.as_ref()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Id of the synthetic node standing in for a failed children fetch.
    #[must_use]
    pub fn error_placeholder(parent: Option<&str>) -> Self {
        Self(format_compact!("{}::load-error", parent.unwrap_or("<root>")))
    }
}

impl Deref for NodeId {
    type Target = str;

    fn deref(&self) -> &str {
        self.0.as_str()
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(CompactString::from(value))
    }
}

impl From<CompactString> for NodeId {
    fn from(value: CompactString) -> Self {
        Self(value)
    }
}

/// What a source knows about children that have not been loaded yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildrenCount {
    Known(usize),
    Unknown,
}

impl ChildrenCount {
    #[must_use]
    pub const fn may_have_children(self) -> bool {
        match self {
            Self::Known(n) => n > 0,
            Self::Unknown => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeItem {
    pub id: NodeId,

    pub label: CompactString,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeItem>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,

    /// Set for lazily populated items; `None` means `children` is complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children_count: Option<ChildrenCount>,
}

impl TreeItem {
    pub fn new(id: impl Into<NodeId>, label: impl Into<CompactString>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            children: Vec::new(),
            disabled: false,
            children_count: None,
        }
    }

    /// Item whose label is its id.
    pub fn leaf(id: &str) -> Self {
        Self::new(id, id)
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<Self>) -> Self {
        self.children = children;
        self
    }

    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub const fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    #[must_use]
    pub const fn with_children_count(mut self, count: ChildrenCount) -> Self {
        self.children_count = Some(count);
        self
    }
}

/// Extracts id, label and children from host item types.
pub trait ItemAccessor<T> {
    fn id_of(&self, item: &T) -> NodeId;

    fn label_of(&self, item: &T) -> CompactString;

    fn children_of<'a>(&self, item: &'a T) -> &'a [T];

    fn is_disabled(&self, _item: &T) -> bool {
        false
    }

    fn children_count(&self, _item: &T) -> Option<ChildrenCount> {
        None
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAccessor;

impl ItemAccessor<TreeItem> for DefaultAccessor {
    fn id_of(&self, item: &TreeItem) -> NodeId {
        item.id.clone()
    }

    fn label_of(&self, item: &TreeItem) -> CompactString {
        item.label.clone()
    }

    fn children_of<'a>(&self, item: &'a TreeItem) -> &'a [TreeItem] {
        &item.children
    }

    fn is_disabled(&self, item: &TreeItem) -> bool {
        item.disabled
    }

    fn children_count(&self, item: &TreeItem) -> Option<ChildrenCount> {
        item.children_count
    }
}

type IdFn<T> = Box<dyn Fn(&T) -> NodeId + Send + Sync>;
type LabelFn<T> = Box<dyn Fn(&T) -> CompactString + Send + Sync>;
type ChildrenFn<T> = Box<dyn for<'a> Fn(&'a T) -> &'a [T] + Send + Sync>;

/// Closure-backed accessor for one-off host types.
pub struct FnAccessor<T> {
    id_of: IdFn<T>,
    label_of: LabelFn<T>,
    children_of: ChildrenFn<T>,
}

impl<T> FnAccessor<T> {
    pub fn new(
        id_of: impl Fn(&T) -> NodeId + Send + Sync + 'static,
        label_of: impl Fn(&T) -> CompactString + Send + Sync + 'static,
        children_of: impl for<'a> Fn(&'a T) -> &'a [T] + Send + Sync + 'static,
    ) -> Self {
        Self {
            id_of: Box::new(id_of),
            label_of: Box::new(label_of),
            children_of: Box::new(children_of),
        }
    }
}

impl<T> ItemAccessor<T> for FnAccessor<T> {
    fn id_of(&self, item: &T) -> NodeId {
        (self.id_of)(item)
    }

    fn label_of(&self, item: &T) -> CompactString {
        (self.label_of)(item)
    }

    fn children_of<'a>(&self, item: &'a T) -> &'a [T] {
        (self.children_of)(item)
    }
}

impl<T> fmt::Debug for FnAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAccessor").finish_non_exhaustive()
    }
}
