//! src/error.rs
//! ============================================================================
//! # `TreeError`: Unified Error Type for the Tree Engine
//!
//! Only caller-input problems (duplicate ids, cycles, bad config) travel as
//! `Err`. Unknown ids and failed fetches are absorbed by the components and
//! turned into observable state; the variants below exist so the places that
//! do surface them can carry the same context.

use std::{io, path::PathBuf};

use compact_str::{CompactString, ToCompactString};
use thiserror::Error;

use crate::{cache::data_source::FetchError, model::item::NodeId};

pub type TreeResult<T> = Result<T, TreeError>;

#[derive(Debug, Error)]
pub enum TreeError {
    /// Referenced id is not (or no longer) in the index.
    #[error("Unknown item: {0}")]
    UnknownItem(NodeId),

    /// Two nodes would share an id.
    #[error("Duplicate item id: {0}")]
    DuplicateId(NodeId),

    /// A node would become its own ancestor.
    #[error("Moving {item} under {parent} would create a cycle")]
    CycleDetected { item: NodeId, parent: NodeId },

    #[error("Move of {item} rejected: {reason}")]
    MoveRejected { item: NodeId, reason: CompactString },

    /// Data source rejected a children fetch.
    #[error("Fetching children of {parent} failed: {message}")]
    Fetch {
        parent: CompactString,
        message: CompactString,
    },

    #[error("Config error: {0}")]
    Config(CompactString),

    #[error("Failed to access config file {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TreeError {
    pub fn fetch(parent: Option<&str>, err: &FetchError) -> Self {
        Self::Fetch {
            parent: CompactString::from(parent.unwrap_or("<root>")),
            message: err.message.clone(),
        }
    }

    /// Structural and fetch errors are absorbed; everything else is the caller's input.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnknownItem(_) | Self::Fetch { .. })
    }

    #[inline]
    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::DuplicateId(_) | Self::CycleDetected { .. } | Self::MoveRejected { .. }
        )
    }

    /// Grouping key for structured log events.
    #[inline]
    #[must_use]
    pub const fn operation_type(&self) -> &'static str {
        match self {
            Self::UnknownItem(_) => "structural",
            Self::DuplicateId(_) | Self::CycleDetected { .. } => "invariant_violation",
            Self::MoveRejected { .. } => "reorder",
            Self::Fetch { .. } => "fetch",
            Self::Config(_) | Self::ConfigIo { .. } => "config",
        }
    }
}

impl From<toml::de::Error> for TreeError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_compact_string())
    }
}

impl From<toml::ser::Error> for TreeError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(err.to_compact_string())
    }
}
