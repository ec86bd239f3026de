//! Core systems for Checktree.
//!
//! This crate provides the plumbing the tree model and controller are built on:
//!
//! - **Signal/Slot System**: Typed notifications between store, model and view
//! - **Property System**: Interior-mutable values with change detection
//! - **Logging**: Tracing targets, convenience macros and performance spans
//!
//! # Example
//!
//! ```
//! use checktree_core::{Property, Signal};
//! use std::sync::Arc;
//!
//! let checked = Arc::new(Property::new(false));
//! let checked_changed = Signal::<bool>::new();
//!
//! checked_changed.connect(|state| println!("checked: {state}"));
//!
//! if checked.set(true) {
//!     checked_changed.emit(true);
//! }
//! ```

pub mod logging;
pub mod property;
pub mod signal;

pub use logging::PerfSpan;
pub use property::Property;
pub use signal::{ConnectionId, Signal};
