//! Property system for Checktree.
//!
//! A [`Property<T>`] is an interior-mutable value with change detection. Tree
//! nodes keep their presentation state (label, icon, read-only flag and so on)
//! in properties so that a routed update can tell whether it changed anything.
//!
//! # Example
//!
//! ```
//! use checktree_core::{Property, Signal};
//!
//! struct Caption {
//!     text: Property<String>,
//!     text_changed: Signal<String>,
//! }
//!
//! impl Caption {
//!     fn set_text(&self, text: &str) {
//!         if self.text.set(text.to_string()) {
//!             self.text_changed.emit(text.to_string());
//!         }
//!     }
//! }
//!
//! let caption = Caption { text: Property::new(String::new()), text_changed: Signal::new() };
//! caption.set_text("Europe");
//! assert_eq!(caption.text.get(), "Europe");
//! ```

use std::fmt;

use parking_lot::RwLock;

/// A reactive property that tracks changes.
///
/// `set()` compares the new value with the current one and reports whether
/// the value actually changed, so callers only notify on real changes.
pub struct Property<T> {
    value: RwLock<T>,
}

impl<T: Clone> Property<T> {
    /// Create a new property with an initial value.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Access the value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.value.read())
    }

    /// Set the value without change detection.
    pub fn set_silent(&self, value: T) {
        *self.value.write() = value;
    }
}

impl<T: Clone + PartialEq> Property<T> {
    /// Set the value, returning `true` if the value changed.
    pub fn set(&self, value: T) -> bool {
        let mut current = self.value.write();
        if *current != value {
            *current = value;
            true
        } else {
            false
        }
    }

    /// Set the value, returning the old value if it changed.
    pub fn replace(&self, value: T) -> Option<T> {
        let mut current = self.value.write();
        if *current != value {
            Some(std::mem::replace(&mut *current, value))
        } else {
            None
        }
    }
}

impl<T: Clone + Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &*self.value.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_set_detects_change() {
        let prop = Property::new(String::from("Africa"));
        assert!(!prop.set("Africa".to_string()));
        assert!(prop.set("Asia".to_string()));
        assert_eq!(prop.get(), "Asia");
    }

    #[test]
    fn test_property_replace() {
        let prop = Property::new(false);
        assert_eq!(prop.replace(false), None);
        assert_eq!(prop.replace(true), Some(false));
        assert!(prop.get());
    }

    #[test]
    fn test_property_with_and_silent() {
        let prop: Property<Option<String>> = Property::default();
        prop.set_silent(Some("leaf".into()));
        assert_eq!(prop.with(|v| v.as_deref().map(str::len)), Some(4));
    }
}
