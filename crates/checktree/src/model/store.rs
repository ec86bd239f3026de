//! The item store boundary.
//!
//! Models never own data; they read and write it through an [`ItemStore`].
//! A store answers queries asynchronously: `fetch` registers completion
//! callbacks that fire later on the same thread of control, or immediately
//! if the store has the answer at hand. Stores report mutations through
//! [`StoreSignals`].

use checktree_core::Signal;

use super::item::{Item, ItemAttributes, ItemValue};
use crate::error::StoreError;

/// Continuation for a successful query.
pub type FetchComplete = Box<dyn FnOnce(Vec<Item>) + Send>;

/// Continuation for a failed query.
pub type FetchFailed = Box<dyn FnOnce(StoreError) + Send>;

/// Continuation for an identity lookup. `None` means no such item.
pub type ItemComplete = Box<dyn FnOnce(Option<Item>) + Send>;

/// An attribute-match query.
///
/// An item matches when every listed attribute holds the listed value and,
/// for top-level queries, when the item is a top-level item of the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    attributes: Vec<(String, ItemValue)>,
    top_level_only: bool,
}

impl Query {
    /// A query matching every item.
    pub fn all() -> Self {
        Self::default()
    }

    /// A query matching the store's top-level items.
    pub fn top_level() -> Self {
        Self {
            attributes: Vec::new(),
            top_level_only: true,
        }
    }

    /// Adds an attribute constraint.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<ItemValue>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Returns `true` if only top-level items match.
    pub fn is_top_level_only(&self) -> bool {
        self.top_level_only
    }

    /// Names of the attributes the query result depends on.
    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Tests the attribute constraints against `item`.
    ///
    /// The top-level constraint is the store's to check.
    pub fn matches_attributes(&self, item: &Item) -> bool {
        self.attributes
            .iter()
            .all(|(name, value)| item.get(name).as_ref() == Some(value))
    }
}

/// Direction of a change in top-level membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootChange {
    /// The item became a top-level item.
    Attach,
    /// The item stopped being a top-level item.
    Detach,
}

/// Signals emitted by item stores.
pub struct StoreSignals {
    /// An attribute changed.
    /// Args: (item, attribute, old value, new value)
    pub item_set: Signal<(Item, String, Option<ItemValue>, Option<ItemValue>)>,

    /// An item was created.
    pub item_created: Signal<Item>,

    /// An item was deleted.
    pub item_deleted: Signal<Item>,

    /// An item was attached to or detached from the top level.
    pub root_changed: Signal<(Item, RootChange)>,
}

impl Default for StoreSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreSignals {
    /// Creates a new set of store signals.
    pub fn new() -> Self {
        Self {
            item_set: Signal::new(),
            item_created: Signal::new(),
            item_deleted: Signal::new(),
            root_changed: Signal::new(),
        }
    }

    /// Disconnects every slot from every signal.
    pub fn disconnect_all(&self) {
        self.item_set.disconnect_all();
        self.item_created.disconnect_all();
        self.item_deleted.disconnect_all();
        self.root_changed.disconnect_all();
    }
}

/// Read/write access to a hierarchical item store.
pub trait ItemStore: Send + Sync {
    /// Runs `query`, delivering the ordered result to `on_complete` or the
    /// failure to `on_error`. Completion order across fetches is not
    /// guaranteed.
    fn fetch(&self, query: &Query, on_complete: FetchComplete, on_error: FetchFailed);

    /// Looks up an item by identity.
    fn fetch_item_by_identity(&self, identity: &str, on_item: ItemComplete, on_error: FetchFailed);

    /// Returns `true` if `item` belongs to this store.
    fn is_item(&self, item: &Item) -> bool;

    /// Returns the identity of `item`.
    fn get_identity(&self, item: &Item) -> String {
        item.identity().to_string()
    }

    /// Returns the value of `attr` on `item`.
    fn get_value(&self, item: &Item, attr: &str) -> Option<ItemValue> {
        item.get(attr)
    }

    /// The attribute holding item labels, if the store declares one.
    fn label_attr(&self) -> Option<String> {
        None
    }

    /// Writes `value` to `attr` on `item`. Emits `item_set` only if the
    /// value changed.
    fn set_value(&self, item: &Item, attr: &str, value: ItemValue) -> Result<(), StoreError>;

    /// Creates an item. With a parent, the item is appended to the parent's
    /// `children_attr` list; without one, it becomes a top-level item.
    fn new_item(
        &self,
        identity: &str,
        attributes: ItemAttributes,
        parent: Option<(&Item, &str)>,
    ) -> Result<Item, StoreError>;

    /// Deletes an item and every reference to it.
    fn delete_item(&self, item: &Item) -> Result<(), StoreError>;

    /// Makes `item` a top-level item.
    fn attach_to_root(&self, item: &Item) -> Result<(), StoreError>;

    /// Removes `item` from the top level.
    fn detach_from_root(&self, item: &Item) -> Result<(), StoreError>;

    /// Returns `true` if `item` is a top-level item.
    fn is_top_level(&self, item: &Item) -> bool;

    /// Returns every item that lists `item` under one of `children_attrs`.
    fn parents_of(&self, item: &Item, children_attrs: &[String]) -> Vec<Item>;

    /// Returns the store's signals.
    fn signals(&self) -> &StoreSignals;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_matching() {
        let mut attrs = ItemAttributes::new();
        attrs.insert("type".into(), "continent".into());
        let item = Item::new("AF", attrs);

        assert!(Query::all().matches_attributes(&item));
        assert!(Query::all().with_attr("type", "continent").matches_attributes(&item));
        assert!(!Query::all().with_attr("type", "country").matches_attributes(&item));
        assert!(!Query::all().with_attr("missing", true).matches_attributes(&item));
    }

    #[test]
    fn test_query_attribute_names() {
        let query = Query::top_level().with_attr("type", "continent").with_attr("visible", true);
        assert!(query.is_top_level_only());
        assert_eq!(query.attribute_names(), vec!["type".to_string(), "visible".to_string()]);
    }
}
