//! Core traits for tree models.
//!
//! A tree view talks to its data only through [`TreeModel`]. Models that
//! can read and write checked state additionally expose [`CheckboxModel`]
//! through [`TreeModel::checkbox_model`]; a tree configured with checkboxes
//! refuses models that do not.

use checktree_core::Signal;

use super::checked::{CheckMode, CheckedState};
use super::item::{Item, ItemAttributes, ItemValue};
use super::store::{FetchComplete, FetchFailed, ItemComplete};
use crate::error::{Result, StoreError};

/// Continuation receiving the model's root item.
pub type RootComplete = Box<dyn FnOnce(Item) + Send>;

/// Signals emitted by tree models.
///
/// Views connect to these to stay in sync with the store.
///
/// # Signal Usage
///
/// ```ignore
/// model.signals().item_changed.connect(|(item, attr, value)| {
///     println!("{item:?}.{attr} = {value:?}");
/// });
/// ```
pub struct ModelSignals {
    /// An attribute of an item changed.
    /// Args: (item, attribute, new value)
    pub item_changed: Signal<(Item, String, ItemValue)>,

    /// The ordered children of an item changed.
    /// Args: (parent, new children)
    pub children_changed: Signal<(Item, Vec<Item>)>,

    /// An item was deleted from the store.
    pub item_deleted: Signal<Item>,

    /// The label attribute was renamed.
    /// Args: (old attribute, new attribute)
    pub label_attr_changed: Signal<(Option<String>, String)>,

    /// A background query failed. Cached state is left untouched.
    pub query_failed: Signal<StoreError>,
}

impl Default for ModelSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelSignals {
    /// Creates a new set of model signals.
    pub fn new() -> Self {
        Self {
            item_changed: Signal::new(),
            children_changed: Signal::new(),
            item_deleted: Signal::new(),
            label_attr_changed: Signal::new(),
            query_failed: Signal::new(),
        }
    }

    /// Disconnects every slot from every signal.
    pub fn disconnect_all(&self) {
        self.item_changed.disconnect_all();
        self.children_changed.disconnect_all();
        self.item_deleted.disconnect_all();
        self.label_attr_changed.disconnect_all();
        self.query_failed.disconnect_all();
    }
}

/// A hierarchical model over an item store.
///
/// Lookups that may need the store (`get_root`, `get_children`,
/// `fetch_item_by_identity`) complete through continuations, which may run
/// before the call returns.
pub trait TreeModel: Send + Sync {
    /// Delivers the root item.
    fn get_root(&self, on_item: RootComplete, on_error: FetchFailed);

    /// Returns `true` if `item` has, or may have, children.
    fn may_have_children(&self, item: &Item) -> bool;

    /// Delivers the ordered children of `parent`.
    fn get_children(&self, parent: &Item, on_complete: FetchComplete, on_error: FetchFailed);

    /// Returns `true` if `item` belongs to this model.
    fn is_item(&self, item: &Item) -> bool;

    /// Looks up an item by identity.
    fn fetch_item_by_identity(&self, identity: &str, on_item: ItemComplete, on_error: FetchFailed);

    /// Returns the identity of `item`.
    fn get_identity(&self, item: &Item) -> String;

    /// Returns the label of `item`.
    fn get_label(&self, item: &Item) -> String;

    /// The attribute labels are read from.
    fn label_attr(&self) -> Option<String>;

    /// Returns an arbitrary attribute of `item`.
    fn get_item_attr(&self, item: &Item, attr: &str) -> Option<ItemValue>;

    /// Creates an item under `parent`.
    fn new_item(&self, identity: &str, attributes: ItemAttributes, parent: &Item) -> Result<Item>;

    /// Moves (or with `copy`, adds) `child` from `old_parent` to `new_parent`.
    fn paste_item(
        &self,
        child: &Item,
        old_parent: Option<&Item>,
        new_parent: &Item,
        copy: bool,
    ) -> Result<()>;

    /// Checkbox support, if the model has any.
    fn checkbox_model(&self) -> Option<&dyn CheckboxModel> {
        None
    }

    /// Returns the model's signals.
    fn signals(&self) -> &ModelSignals;

    /// Disconnects from the store. Completions arriving afterwards are
    /// ignored.
    fn destroy(&self);
}

/// Read/write access to checked state.
pub trait CheckboxModel: Send + Sync {
    /// The supported states.
    fn check_mode(&self) -> CheckMode;

    /// Returns `true` for tri-state checkboxes.
    fn multi_state(&self) -> bool {
        self.check_mode().is_multi_state()
    }

    /// The attribute holding checked state.
    fn checked_attr(&self) -> String;

    /// Returns the checked state of `item`, or `None` if it carries no
    /// checkbox.
    fn get_checked(&self, item: &Item) -> Option<CheckedState>;

    /// Sets the checked state of `item`.
    ///
    /// Rejects states the mode does not support without changing anything.
    /// A definite state cascades to descendants; ancestors are re-derived.
    fn set_checked(&self, item: &Item, state: CheckedState) -> Result<()>;
}
