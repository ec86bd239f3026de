//! Prelude module for Checktree.
//!
//! ```ignore
//! use checktree::prelude::*;
//! ```

// ============================================================================
// Signal/Slot and Property System
// ============================================================================

pub use checktree_core::{ConnectionId, Property, Signal};

// ============================================================================
// Models
// ============================================================================

pub use crate::model::{
    CheckMode, CheckboxModel, CheckedAggregate, CheckedState, FetchMode, ForestStoreModel, Item,
    ItemAttributes, ItemStore, ItemValue, MemoryStore, ModelConfig, Query, StoreModel, TreeModel,
};

// ============================================================================
// Tree
// ============================================================================

pub use crate::widget::{
    CheckBox, CheckboxStyle, CheckboxWidget, ClickTarget, CustomWidget, EventSource,
    InternalEvent, NodeId, NodeProperty, Tree, TreeConfig, TreeKey, TreeNode,
};

// ============================================================================
// Errors
// ============================================================================

pub use crate::error::{ConfigError, StoreError, TreeError};
