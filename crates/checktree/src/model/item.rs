//! Item handles and attribute values.
//!
//! An [`Item`] is an opaque, cheaply cloneable handle into a store. Two
//! handles are equal only if they refer to the same underlying item; the
//! attribute values are never compared. Every item carries a stable identity
//! string that is unique within its store.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;

use super::checked::CheckedState;

/// A value stored under an item attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemValue {
    /// String data (labels, icons, tooltips).
    String(String),
    /// Integer data.
    Int(i64),
    /// Floating point data.
    Float(f64),
    /// Boolean data.
    Bool(bool),
    /// Checkbox state.
    Checked(CheckedState),
    /// References to other items (children attributes).
    Items(Vec<Item>),
}

impl ItemValue {
    /// Attempts to get the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ItemValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Attempts to get the value as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ItemValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to get the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ItemValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to get the value as a checked state.
    ///
    /// Booleans convert to `Checked`/`Unchecked` and the string `"mixed"`
    /// to `Mixed`, which is how item files spell tri-state values.
    pub fn as_checked(&self) -> Option<CheckedState> {
        match self {
            ItemValue::Checked(s) => Some(*s),
            ItemValue::Bool(b) => Some(CheckedState::from(*b)),
            ItemValue::String(s) if s == "mixed" => Some(CheckedState::Mixed),
            _ => None,
        }
    }

    /// Attempts to get the value as a list of item references.
    pub fn as_items(&self) -> Option<&[Item]> {
        match self {
            ItemValue::Items(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Renders scalar values as text, for labels.
    pub fn to_text(&self) -> Option<String> {
        match self {
            ItemValue::String(s) => Some(s.clone()),
            ItemValue::Int(n) => Some(n.to_string()),
            ItemValue::Float(n) => Some(n.to_string()),
            ItemValue::Bool(b) => Some(b.to_string()),
            ItemValue::Checked(s) => Some(s.to_string()),
            ItemValue::Items(_) => None,
        }
    }
}

impl From<String> for ItemValue {
    fn from(s: String) -> Self {
        ItemValue::String(s)
    }
}

impl From<&str> for ItemValue {
    fn from(s: &str) -> Self {
        ItemValue::String(s.to_string())
    }
}

impl From<i64> for ItemValue {
    fn from(n: i64) -> Self {
        ItemValue::Int(n)
    }
}

impl From<f64> for ItemValue {
    fn from(n: f64) -> Self {
        ItemValue::Float(n)
    }
}

impl From<bool> for ItemValue {
    fn from(b: bool) -> Self {
        ItemValue::Bool(b)
    }
}

impl From<CheckedState> for ItemValue {
    fn from(s: CheckedState) -> Self {
        ItemValue::Checked(s)
    }
}

impl From<Vec<Item>> for ItemValue {
    fn from(items: Vec<Item>) -> Self {
        ItemValue::Items(items)
    }
}

/// Attribute map used to create items.
pub type ItemAttributes = BTreeMap<String, ItemValue>;

struct ItemInner {
    identity: String,
    attributes: RwLock<ItemAttributes>,
}

/// A handle to a store item.
///
/// Equality and hashing are by identity of the underlying item, not by value.
#[derive(Clone)]
pub struct Item(Arc<ItemInner>);

impl Item {
    /// Creates a new item with the given identity and attributes.
    ///
    /// Stores call this; models and views receive items from stores.
    pub fn new(identity: impl Into<String>, attributes: ItemAttributes) -> Self {
        Self(Arc::new(ItemInner {
            identity: identity.into(),
            attributes: RwLock::new(attributes),
        }))
    }

    /// The item's identity string.
    pub fn identity(&self) -> &str {
        &self.0.identity
    }

    /// Returns a copy of the value stored under `attr`.
    pub fn get(&self, attr: &str) -> Option<ItemValue> {
        self.0.attributes.read().get(attr).cloned()
    }

    /// Returns `true` if the item has a value under `attr`.
    pub fn has(&self, attr: &str) -> bool {
        self.0.attributes.read().contains_key(attr)
    }

    /// Stores `value` under `attr`, returning the previous value.
    pub fn set(&self, attr: &str, value: ItemValue) -> Option<ItemValue> {
        self.0.attributes.write().insert(attr.to_string(), value)
    }

    /// Removes `attr`, returning its value.
    pub fn remove(&self, attr: &str) -> Option<ItemValue> {
        self.0.attributes.write().remove(attr)
    }

    /// Returns the attribute names currently set.
    pub fn attribute_names(&self) -> Vec<String> {
        self.0.attributes.read().keys().cloned().collect()
    }

    /// Returns `true` if both handles refer to the same item.
    pub fn ptr_eq(&self, other: &Item) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Item").field(&self.0.identity).finish()
    }
}
