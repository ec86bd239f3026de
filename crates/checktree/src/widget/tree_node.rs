//! Tree nodes: the live presentation of one item.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::new_key_type;

use checktree_core::{Property, Signal};

use super::checkbox::CheckboxWidget;
use super::router::NodeProperty;
use crate::model::{CheckedState, Item, ItemValue};

new_key_type! {
    /// Identifies a node within its tree.
    pub struct NodeId;
}

/// A node bound to one item.
///
/// Several nodes may be bound to the same item at once, for example an item
/// listed under two expanded parents.
pub struct TreeNode {
    id: NodeId,
    item: Item,
    identity: String,
    parent: Option<NodeId>,
    label: Property<String>,
    icon: Property<Option<String>>,
    tooltip: Property<Option<String>>,
    read_only: Property<bool>,
    styling: Property<Option<ItemValue>>,
    expandable: AtomicBool,
    expanded: AtomicBool,
    children: Mutex<Vec<NodeId>>,
    checkbox: Mutex<Option<Box<dyn CheckboxWidget>>>,

    /// Emitted for every presentation update applied to the node.
    pub property_changed: Signal<(NodeProperty, ItemValue)>,
}

impl TreeNode {
    /// Creates a node for `item`.
    pub fn new(id: NodeId, item: Item, identity: String, parent: Option<NodeId>) -> Self {
        Self {
            id,
            item,
            identity,
            parent,
            label: Property::default(),
            icon: Property::default(),
            tooltip: Property::default(),
            read_only: Property::new(false),
            styling: Property::default(),
            expandable: AtomicBool::new(false),
            expanded: AtomicBool::new(false),
            children: Mutex::new(Vec::new()),
            checkbox: Mutex::new(None),
            property_changed: Signal::new(),
        }
    }

    /// Sets the label using builder pattern.
    pub fn with_label(self, label: impl Into<String>) -> Self {
        self.label.set_silent(label.into());
        self
    }

    /// Sets the icon using builder pattern.
    pub fn with_icon(self, icon: Option<String>) -> Self {
        self.icon.set_silent(icon);
        self
    }

    /// Sets expandability using builder pattern.
    pub fn with_expandable(self, expandable: bool) -> Self {
        self.expandable.store(expandable, Ordering::SeqCst);
        self
    }

    /// Attaches a checkbox using builder pattern.
    pub fn with_checkbox(self, checkbox: Box<dyn CheckboxWidget>) -> Self {
        self.read_only.set_silent(checkbox.read_only());
        *self.checkbox.lock() = Some(checkbox);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn label(&self) -> String {
        self.label.get()
    }

    pub fn icon(&self) -> Option<String> {
        self.icon.get()
    }

    pub fn tooltip(&self) -> Option<String> {
        self.tooltip.get()
    }

    pub fn styling(&self) -> Option<ItemValue> {
        self.styling.get()
    }

    /// Returns `true` if the checkbox rejects user input.
    pub fn is_read_only(&self) -> bool {
        self.read_only.get()
    }

    /// Returns `true` if the node has, or may have, children.
    pub fn is_expandable(&self) -> bool {
        self.expandable.load(Ordering::SeqCst)
    }

    pub(crate) fn set_expandable(&self, expandable: bool) {
        self.expandable.store(expandable, Ordering::SeqCst);
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded.load(Ordering::SeqCst)
    }

    pub(crate) fn set_expanded(&self, expanded: bool) -> bool {
        self.expanded.swap(expanded, Ordering::SeqCst) != expanded
    }

    /// Child nodes, in display order. Empty unless expanded.
    pub fn children(&self) -> Vec<NodeId> {
        self.children.lock().clone()
    }

    pub(crate) fn replace_children(&self, children: Vec<NodeId>) -> Vec<NodeId> {
        std::mem::replace(&mut *self.children.lock(), children)
    }

    pub(crate) fn remove_child(&self, child: NodeId) {
        self.children.lock().retain(|id| *id != child);
    }

    /// Returns `true` if the node shows a checkbox.
    pub fn has_checkbox(&self) -> bool {
        self.checkbox.lock().is_some()
    }

    /// The checkbox's displayed state.
    pub fn checked(&self) -> Option<CheckedState> {
        self.checkbox.lock().as_ref().map(|widget| widget.checked())
    }

    /// Runs `f` against the checkbox, if there is one.
    pub(crate) fn with_checkbox_mut<R>(
        &self,
        f: impl FnOnce(&mut dyn CheckboxWidget) -> R,
    ) -> Option<R> {
        let mut checkbox = self.checkbox.lock();
        checkbox.as_mut().map(|widget| f(widget.as_mut()))
    }

    /// Applies one presentation update.
    pub fn apply(&self, property: NodeProperty, value: &ItemValue) {
        match property {
            NodeProperty::Label => {
                self.label.set(value.to_text().unwrap_or_default());
            }
            NodeProperty::Icon => {
                self.icon.set(value.to_text());
            }
            NodeProperty::Tooltip => {
                self.tooltip.set(value.to_text());
            }
            NodeProperty::ReadOnly => {
                let read_only = value.as_bool().unwrap_or(false);
                self.read_only.set(read_only);
                self.with_checkbox_mut(|widget| widget.set_read_only(read_only));
            }
            NodeProperty::Styling => {
                self.styling.set(Some(value.clone()));
            }
            NodeProperty::StoreChecked => {
                if let Some(state) = value.as_checked() {
                    self.with_checkbox_mut(|widget| widget.set_checked(state));
                }
            }
        }
        self.property_changed.emit((property, value.clone()));
    }
}

impl fmt::Debug for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeNode")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("label", &self.label.get())
            .field("checked", &self.checked())
            .finish()
    }
}
