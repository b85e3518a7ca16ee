//! `src/cache/data_source.rs`
//! ============================================================================
//! # `DataSource`: External Children Fetch Seam
//!
//! The host implements this to populate lazily loaded subtrees. Timeouts and
//! retries belong here, not in the cache.

use async_trait::async_trait;
use compact_str::CompactString;
use thiserror::Error;

use crate::model::item::{ChildrenCount, NodeId, TreeItem};

/// Rejection from a data source. `Clone` so one failed fetch can be handed to
/// every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FetchError {
    pub message: CompactString,
}

impl FetchError {
    pub fn new(message: impl Into<CompactString>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Children of `parent`, or the top-level items when `parent` is `None`.
    async fn get_tree_items(&self, parent: Option<&NodeId>) -> Result<Vec<TreeItem>, FetchError>;

    /// How many children `item` has before they are fetched.
    fn get_children_count(&self, item: &TreeItem) -> ChildrenCount {
        item.children_count
            .unwrap_or(ChildrenCount::Known(item.children.len()))
    }
}
