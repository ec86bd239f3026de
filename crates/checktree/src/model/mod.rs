//! Models over hierarchical item stores.
//!
//! This module separates the data a tree shows from the tree itself:
//!
//! - [`ItemStore`]: where items live. Queries complete through callbacks.
//! - [`StoreModel`]: a single-root tree over a store, owning checked-state
//!   cascading and aggregation.
//! - [`ForestStoreModel`]: a store without a single root presented under a
//!   virtual root whose children are kept in sync by requery and diff.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use checktree::model::{ForestStoreModel, MemoryStore, ModelConfig, TreeModel};
//!
//! let store = Arc::new(MemoryStore::from_json(json)?);
//! let model = ForestStoreModel::new(store, ModelConfig::new().with_label_attr("name"));
//!
//! model.signals().children_changed.connect(|(parent, children)| {
//!     println!("{parent:?} now has {} children", children.len());
//! });
//! ```
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────┐ item_set     ┌─────────────┐ item_changed      ┌──────┐
//! │  ItemStore  │─────────────>│ StoreModel  │──────────────────>│ Tree │
//! │             │ root_changed │   Forest    │ children_changed  │      │
//! └─────────────┘              └─────────────┘                   └──────┘
//!        ^                            │ set_checked                  │
//!        └────────────────────────────┴──────────────────────────────┘
//! ```

mod checked;
mod config;
mod forest_model;
mod item;
mod memory_store;
mod store;
mod store_model;
mod traits;

pub use checked::{CheckMode, CheckedAggregate, CheckedState, UnanimousAggregate};
pub use config::ModelConfig;
pub use forest_model::{ForestStoreModel, RootState};
pub use item::{Item, ItemAttributes, ItemValue};
pub use memory_store::{FetchMode, MemoryStore};
pub use store::{
    FetchComplete, FetchFailed, ItemComplete, ItemStore, Query, RootChange, StoreSignals,
};
pub use store_model::StoreModel;
pub use traits::{CheckboxModel, ModelSignals, RootComplete, TreeModel};
