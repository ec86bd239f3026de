//! Checkbox tree widgets.
//!
//! - [`Tree`]: the controller binding a model to live nodes
//! - [`TreeNode`]: the presentation of one item
//! - [`AttributeEventRouter`]: which node property a model event feeds
//! - [`NodeIdentityIndex`]: which nodes show a given item
//! - [`CheckboxWidget`]: the contract node checkboxes implement
//!
//! # Data Flow
//!
//! ```text
//!  model item_changed(item, attr, value)
//!        │
//!        ▼
//!  AttributeEventRouter ── attr ──> NodeProperty
//!        │
//!        ▼
//!  NodeIdentityIndex ── identity ──> [TreeNode, TreeNode, ...]
//!        │
//!        ▼
//!  TreeNode::apply(property, value)
//! ```
//!
//! User input travels the other way: a checkbox toggle becomes
//! `set_checked` on the model, and the resulting notification comes back
//! down the path above to every node showing the item.

mod checkbox;
mod node_index;
mod router;
mod tree;
mod tree_node;

pub use checkbox::{CheckBox, CheckboxFactory, CheckboxWidget, CustomWidget};
pub use node_index::NodeIdentityIndex;
pub use router::{AttributeEventRouter, EventSource, InternalEvent, NodeProperty};
pub use tree::{CheckboxStyle, ClickTarget, Tree, TreeConfig, TreeKey};
pub use tree_node::{NodeId, TreeNode};
