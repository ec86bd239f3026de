//! Error types for checktree.

use thiserror::Error;

use crate::model::{CheckMode, CheckedState};

/// Setup-time contract violations. These abort initialization.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Checkboxes were requested but the model cannot read or write checked state.
    #[error("model does not support get_checked() and/or set_checked()")]
    ModelLacksCheckboxSupport,

    /// A custom checkbox widget failed the conformance probe.
    #[error("checkbox widget does not conform: {0}")]
    NonConformingWidget(String),

    /// The model was configured without any children attribute.
    #[error("model has no children attribute to add items under")]
    NoChildrenAttribute,
}

/// Errors reported by an item store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The item is not (or no longer) part of the store.
    #[error("unknown item: {0}")]
    UnknownItem(String),

    /// An item with this identity already exists.
    #[error("duplicate identity: {0}")]
    DuplicateIdentity(String),

    /// Store data could not be parsed.
    #[error("failed to parse store data: {0}")]
    Parse(String),

    /// A query failed.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The root query did not match exactly one item.
    #[error("root query matched {0} items, expected exactly one")]
    AmbiguousRoot(usize),

    /// The model has been destroyed.
    #[error("model has been torn down")]
    TornDown,
}

/// The main error type for checktree operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Configuration error (fatal at setup).
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The checked state is not supported by the model's check mode.
    #[error("checked state {state} is not supported in {mode} mode")]
    InvalidCheckState {
        /// The rejected state.
        state: CheckedState,
        /// The model's mode.
        mode: CheckMode,
    },

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for checktree operations.
pub type Result<T> = std::result::Result<T, TreeError>;
