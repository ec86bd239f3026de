//! Routing from model events to node properties.
//!
//! The tree receives item notifications keyed by store attribute name. The
//! [`AttributeEventRouter`] decides which presentation property of a
//! [`TreeNode`](super::TreeNode) each attribute feeds. Attribute names are
//! model configuration and can change at runtime, so entries can be renamed
//! in place.
//!
//! Events the tree synthesizes itself live in a separate namespace
//! ([`EventSource::Internal`]), so they can never collide with a store
//! attribute of the same spelling.

use std::collections::HashMap;
use std::fmt;

use checktree_core::logging::targets;

/// Events the tree raises itself rather than receiving from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalEvent {
    /// Node styling should be recomputed.
    Styling,
}

/// The key of a routing entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventSource {
    /// A store attribute, by name.
    Attribute(String),
    /// An event synthesized by the tree.
    Internal(InternalEvent),
}

impl EventSource {
    /// Shorthand for [`EventSource::Attribute`].
    pub fn attr(name: impl Into<String>) -> Self {
        EventSource::Attribute(name.into())
    }

    fn is_empty(&self) -> bool {
        matches!(self, EventSource::Attribute(name) if name.is_empty())
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSource::Attribute(name) => write!(f, "{name}"),
            EventSource::Internal(event) => write!(f, "<{event:?}>"),
        }
    }
}

/// Presentation properties of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeProperty {
    /// Label text.
    Label,
    /// Icon name.
    Icon,
    /// Tooltip text.
    Tooltip,
    /// Whether the checkbox rejects user input.
    ReadOnly,
    /// Styling data.
    Styling,
    /// Checked state written by the store. Updates the checkbox only and is
    /// never written back to the model.
    StoreChecked,
}

/// Maps event sources to node properties. At most one entry per source.
#[derive(Debug, Default, Clone)]
pub struct AttributeEventRouter {
    routes: HashMap<EventSource, NodeProperty>,
}

impl AttributeEventRouter {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `source -> target`, replacing any entry for `source`.
    ///
    /// If `old` is given its entry is removed first, whether or not a new
    /// entry is installed. An empty attribute name is ignored. Returns
    /// `true` if an entry was installed.
    pub fn route(
        &mut self,
        old: Option<&EventSource>,
        source: EventSource,
        target: NodeProperty,
    ) -> bool {
        if let Some(old) = old.filter(|old| !old.is_empty()) {
            if self.routes.remove(old).is_some() {
                tracing::debug!(target: targets::TREE, source = %old, "route removed");
            }
        }
        if source.is_empty() {
            return false;
        }
        tracing::debug!(target: targets::TREE, %source, ?target, "route installed");
        self.routes.insert(source, target);
        true
    }

    /// [`route`](Self::route) for store attributes.
    pub fn route_attr(&mut self, old: Option<&str>, attr: &str, target: NodeProperty) -> bool {
        let old = old.map(EventSource::attr);
        self.route(old.as_ref(), EventSource::attr(attr), target)
    }

    /// The property `source` feeds, if routed.
    pub fn resolve(&self, source: &EventSource) -> Option<NodeProperty> {
        self.routes.get(source).copied()
    }

    /// [`resolve`](Self::resolve) for store attributes.
    pub fn resolve_attr(&self, attr: &str) -> Option<NodeProperty> {
        self.resolve(&EventSource::attr(attr))
    }

    /// Removes the entry for `source`.
    pub fn remove(&mut self, source: &EventSource) -> Option<NodeProperty> {
        self.routes.remove(source)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if nothing is routed.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_writer_wins() {
        let mut router = AttributeEventRouter::new();
        router.route_attr(None, "name", NodeProperty::Label);
        router.route_attr(None, "name", NodeProperty::Tooltip);

        assert_eq!(router.resolve_attr("name"), Some(NodeProperty::Tooltip));
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn test_rename() {
        let mut router = AttributeEventRouter::new();
        router.route_attr(None, "checked", NodeProperty::StoreChecked);
        router.route_attr(Some("checked"), "selected", NodeProperty::StoreChecked);

        assert_eq!(router.resolve_attr("checked"), None);
        assert_eq!(router.resolve_attr("selected"), Some(NodeProperty::StoreChecked));
    }

    #[test]
    fn test_old_entry_removed_even_without_install() {
        let mut router = AttributeEventRouter::new();
        router.route_attr(None, "icon", NodeProperty::Icon);

        assert!(!router.route_attr(Some("icon"), "", NodeProperty::Icon));
        assert_eq!(router.resolve_attr("icon"), None);
        assert!(router.is_empty());
    }

    #[test]
    fn test_empty_names_are_ignored() {
        let mut router = AttributeEventRouter::new();
        assert!(!router.route_attr(Some(""), "", NodeProperty::Label));
        assert!(router.is_empty());
        assert_eq!(router.resolve_attr("missing"), None);
    }

    #[test]
    fn test_internal_events_do_not_collide_with_attributes() {
        let mut router = AttributeEventRouter::new();
        router.route(
            None,
            EventSource::Internal(InternalEvent::Styling),
            NodeProperty::Styling,
        );
        router.route_attr(None, "Styling", NodeProperty::Label);

        assert_eq!(
            router.resolve(&EventSource::Internal(InternalEvent::Styling)),
            Some(NodeProperty::Styling)
        );
        assert_eq!(router.resolve_attr("Styling"), Some(NodeProperty::Label));
        assert_eq!(router.len(), 2);
    }
}
