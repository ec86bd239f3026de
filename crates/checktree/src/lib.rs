//! Checktree - tri-state checkbox trees over hierarchical item stores.
//!
//! This is the main crate. It re-exports the reactive plumbing from
//! `checktree-core` and adds the models and the tree controller.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use checktree::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::from_json(r#"{
//!         "identifier": "id",
//!         "label": "name",
//!         "items": [ { "id": "a", "name": "Alpha", "checked": true } ]
//!     }"#)?);
//!     let model = ForestStoreModel::new(store, ModelConfig::new());
//!     let tree = Tree::new(model, TreeConfig::new())?;
//!     assert_eq!(tree.node_count(), 2);
//!     Ok(())
//! }
//! ```

pub use checktree_core::*;

pub mod error;
pub mod model;
pub mod prelude;
pub mod widget;

pub use error::{ConfigError, Result, StoreError, TreeError};
