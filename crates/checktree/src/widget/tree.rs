//! The tree controller.
//!
//! [`Tree`] binds a [`TreeModel`] to a set of live [`TreeNode`]s. It owns the
//! [`AttributeEventRouter`] and the [`NodeIdentityIndex`]:
//!
//! - Model `item_changed` notifications are resolved to a node property by
//!   the router and broadcast to every node bound to the item.
//! - Model `children_changed` notifications reconcile the child nodes of
//!   every expanded node bound to the parent.
//! - Checkbox interaction is turned into `set_checked` on the model. The
//!   node's checkbox is never written directly on that path; it converges
//!   through the model's own notification, like every other node showing
//!   the same item.
//!
//! # Example
//!
//! ```ignore
//! let tree = Tree::new(model.clone(), TreeConfig::new().with_branch_read_only(true))?;
//! tree.checkbox_clicked.connect(|(item, _node, state)| {
//!     println!("{item:?} is now {state}");
//! });
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use checktree_core::logging::targets;
use checktree_core::{ConnectionId, Signal};

use super::checkbox::{CheckBox, CheckboxWidget, CustomWidget};
use super::node_index::NodeIdentityIndex;
use super::router::{AttributeEventRouter, EventSource, InternalEvent, NodeProperty};
use super::tree_node::{NodeId, TreeNode};
use crate::error::{ConfigError, Result};
use crate::model::{CheckedState, Item, ItemValue, TreeModel};

/// Whether nodes get checkboxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckboxStyle {
    /// Every item the model reports a checked state for gets a checkbox.
    #[default]
    Default,
    /// No checkboxes.
    None,
}

/// Tree configuration.
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Checkbox style.
    pub checkbox_style: CheckboxStyle,
    /// Branch checkboxes reject user input. Programmatic writes still work.
    pub branch_read_only: bool,
    /// Show icons on branch nodes.
    pub branch_icons: bool,
    /// Show icons on leaf nodes.
    pub node_icons: bool,
    /// Attribute holding the icon name.
    pub icon_attr: Option<String>,
    /// Route the internal styling event to nodes.
    pub styling: bool,
    /// Checkbox widget to use instead of [`CheckBox`].
    pub custom_widget: Option<CustomWidget>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            checkbox_style: CheckboxStyle::Default,
            branch_read_only: false,
            branch_icons: true,
            node_icons: true,
            icon_attr: None,
            styling: false,
            custom_widget: None,
        }
    }
}

impl TreeConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checkbox_style(mut self, style: CheckboxStyle) -> Self {
        self.checkbox_style = style;
        self
    }

    pub fn with_branch_read_only(mut self, read_only: bool) -> Self {
        self.branch_read_only = read_only;
        self
    }

    pub fn with_branch_icons(mut self, visible: bool) -> Self {
        self.branch_icons = visible;
        self
    }

    pub fn with_node_icons(mut self, visible: bool) -> Self {
        self.node_icons = visible;
        self
    }

    pub fn with_icon_attr(mut self, attr: impl Into<String>) -> Self {
        self.icon_attr = Some(attr.into());
        self
    }

    pub fn with_styling(mut self, styling: bool) -> Self {
        self.styling = styling;
        self
    }

    pub fn with_custom_widget(mut self, widget: CustomWidget) -> Self {
        self.custom_widget = Some(widget);
        self
    }

    /// Returns `true` unless checkboxes are turned off.
    pub fn checkboxes_enabled(&self) -> bool {
        self.checkbox_style != CheckboxStyle::None
    }
}

/// Where on a node a click landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    /// The checkbox.
    Checkbox,
    /// The expand/collapse control.
    Expando,
    /// Anywhere else on the node.
    Label,
}

/// Keys the tree reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeKey {
    Space,
    Enter,
    Left,
    Right,
}

enum ModelConnection {
    ItemChanged(ConnectionId),
    ChildrenChanged(ConnectionId),
    ItemDeleted(ConnectionId),
    LabelAttrChanged(ConnectionId),
}

/// A checkbox tree over a [`TreeModel`].
pub struct Tree {
    this: Weak<Tree>,
    model: Arc<dyn TreeModel>,
    config: TreeConfig,
    router: Mutex<AttributeEventRouter>,
    index: NodeIdentityIndex,
    root_node: Mutex<Option<NodeId>>,
    connections: Mutex<Vec<ModelConnection>>,
    torn_down: AtomicBool,

    /// A checkbox was changed by the user.
    /// Args: (item, node, new state)
    pub checkbox_clicked: Signal<(Item, NodeId, CheckedState)>,

    /// A node was clicked anywhere but its expando. A checkbox click emits
    /// this after `checkbox_clicked`.
    pub clicked: Signal<(Item, NodeId)>,
}

impl Tree {
    /// Builds a tree over `model` and loads its root.
    ///
    /// Fails if checkboxes are enabled and the model has no checkbox
    /// support, or if a custom checkbox widget does not conform.
    pub fn new(model: Arc<dyn TreeModel>, config: TreeConfig) -> Result<Arc<Self>> {
        let mut router = AttributeEventRouter::new();
        if config.checkboxes_enabled() {
            let checkbox_model = model
                .checkbox_model()
                .ok_or(ConfigError::ModelLacksCheckboxSupport)?;
            if let Some(custom) = &config.custom_widget {
                custom.verify(checkbox_model.check_mode())?;
            }
            router.route_attr(None, &checkbox_model.checked_attr(), NodeProperty::StoreChecked);
        }
        if let Some(label_attr) = model.label_attr() {
            router.route_attr(None, &label_attr, NodeProperty::Label);
        }
        if let Some(icon_attr) = &config.icon_attr {
            router.route_attr(None, icon_attr, NodeProperty::Icon);
        }
        if config.styling {
            router.route(
                None,
                EventSource::Internal(InternalEvent::Styling),
                NodeProperty::Styling,
            );
        }

        let tree = Arc::new_cyclic(|weak: &Weak<Self>| {
            let signals = model.signals();
            let on_change = weak.clone();
            let item_changed = signals.item_changed.connect(move |(item, attr, value)| {
                if let Some(tree) = on_change.upgrade() {
                    tree.on_item_change(item, attr, value);
                }
            });
            let on_children = weak.clone();
            let children_changed = signals.children_changed.connect(move |(parent, children)| {
                if let Some(tree) = on_children.upgrade() {
                    tree.on_children_change(parent, children);
                }
            });
            let on_delete = weak.clone();
            let item_deleted = signals.item_deleted.connect(move |item| {
                if let Some(tree) = on_delete.upgrade() {
                    tree.on_item_delete(item);
                }
            });
            let on_label = weak.clone();
            let label_attr_changed = signals.label_attr_changed.connect(move |(old, new)| {
                if let Some(tree) = on_label.upgrade() {
                    tree.on_label_attr_change(old.as_deref(), new);
                }
            });

            Self {
                this: weak.clone(),
                model: Arc::clone(&model),
                config,
                router: Mutex::new(router),
                index: NodeIdentityIndex::new(),
                root_node: Mutex::new(None),
                connections: Mutex::new(vec![
                    ModelConnection::ItemChanged(item_changed),
                    ModelConnection::ChildrenChanged(children_changed),
                    ModelConnection::ItemDeleted(item_deleted),
                    ModelConnection::LabelAttrChanged(label_attr_changed),
                ]),
                torn_down: AtomicBool::new(false),
                checkbox_clicked: Signal::new(),
                clicked: Signal::new(),
            }
        });

        tracing::debug!(target: targets::TREE, checkboxes = tree.config.checkboxes_enabled(), "tree created");
        tree.load_root();
        Ok(tree)
    }

    pub fn model(&self) -> &Arc<dyn TreeModel> {
        &self.model
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// The root node, once the model has delivered the root.
    pub fn root_node(&self) -> Option<NodeId> {
        *self.root_node.lock()
    }

    pub fn node(&self, id: NodeId) -> Option<Arc<TreeNode>> {
        self.index.get(id)
    }

    /// Every node currently showing `item`.
    pub fn nodes_for(&self, item: &Item) -> Vec<Arc<TreeNode>> {
        let identity = self.model.get_identity(item);
        self.index.nodes_for(&identity)
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Installs a routing entry, replacing `old` if given.
    pub fn route(&self, old: Option<&EventSource>, source: EventSource, target: NodeProperty) -> bool {
        self.router.lock().route(old, source, target)
    }

    /// The property `source` is routed to.
    pub fn resolve(&self, source: &EventSource) -> Option<NodeProperty> {
        self.router.lock().resolve(source)
    }

    /// Delivers an internal event for `item` to its nodes. Returns the
    /// number of nodes updated.
    pub fn emit_internal(&self, item: &Item, event: InternalEvent, value: ItemValue) -> usize {
        let Some(property) = self.resolve(&EventSource::Internal(event)) else {
            return 0;
        };
        let identity = self.model.get_identity(item);
        self.index.broadcast(&identity, property, &value)
    }

    /// Returns `true` if the node's icon should be shown.
    pub fn icon_visible(&self, id: NodeId) -> bool {
        match self.node(id) {
            Some(node) if node.is_expandable() => self.config.branch_icons,
            Some(_) => self.config.node_icons,
            None => false,
        }
    }

    // =========================================================================
    // Node lifecycle
    // =========================================================================

    fn load_root(&self) {
        let weak = self.this.clone();
        self.model.get_root(
            Box::new(move |root| {
                if let Some(tree) = weak.upgrade() {
                    tree.set_root(root);
                }
            }),
            Box::new(|err| {
                tracing::warn!(target: targets::TREE, %err, "failed to load root");
            }),
        );
    }

    fn set_root(&self, root: Item) {
        if self.is_torn_down() {
            return;
        }
        let node = self.create_node(&root, None);
        *self.root_node.lock() = Some(node.id());
        self.expand(node.id());
    }

    fn create_checkbox(&self, item: &Item, read_only: bool) -> Option<Box<dyn CheckboxWidget>> {
        if !self.config.checkboxes_enabled() {
            return None;
        }
        let checkbox_model = self.model.checkbox_model()?;
        let state = checkbox_model.get_checked(item)?;
        let mode = checkbox_model.check_mode();
        let mut widget: Box<dyn CheckboxWidget> = match &self.config.custom_widget {
            Some(custom) => custom.create(state, mode),
            None => Box::new(CheckBox::new(state, mode)),
        };
        widget.set_checked(state);
        widget.set_read_only(read_only);
        Some(widget)
    }

    fn create_node(&self, item: &Item, parent: Option<NodeId>) -> Arc<TreeNode> {
        let identity = self.model.get_identity(item);
        let expandable = self.model.may_have_children(item);
        let checkbox = self.create_checkbox(item, expandable && self.config.branch_read_only);
        let icon = self
            .config
            .icon_attr
            .as_ref()
            .and_then(|attr| self.model.get_item_attr(item, attr))
            .and_then(|value| value.to_text());
        let label = self.model.get_label(item);

        let node = self.index.insert(|id| {
            let node = TreeNode::new(id, item.clone(), identity, parent)
                .with_label(label)
                .with_icon(icon)
                .with_expandable(expandable);
            match checkbox {
                Some(checkbox) => node.with_checkbox(checkbox),
                None => node,
            }
        });
        tracing::debug!(target: targets::TREE, identity = node.identity(), id = ?node.id(), "node created");
        node
    }

    fn destroy_subtree(&self, id: NodeId) {
        let Some(node) = self.index.remove(id) else {
            return;
        };
        for child in node.replace_children(Vec::new()) {
            self.destroy_subtree(child);
        }
        let mut root = self.root_node.lock();
        if *root == Some(id) {
            *root = None;
        }
        tracing::debug!(target: targets::TREE, identity = node.identity(), ?id, "node destroyed");
    }

    /// Expands a node, loading its children through the model.
    pub fn expand(&self, id: NodeId) {
        let Some(node) = self.node(id) else {
            return;
        };
        if !node.is_expandable() || !node.set_expanded(true) {
            return;
        }
        let weak = self.this.clone();
        let identity = node.identity().to_string();
        self.model.get_children(
            node.item(),
            Box::new(move |children| {
                if let Some(tree) = weak.upgrade() {
                    tree.set_children(id, &children);
                }
            }),
            Box::new(move |err| {
                tracing::warn!(target: targets::TREE, identity = %identity, %err, "failed to load children");
            }),
        );
    }

    /// Collapses a node, discarding its child nodes.
    pub fn collapse(&self, id: NodeId) {
        let Some(node) = self.node(id) else {
            return;
        };
        if node.set_expanded(false) {
            for child in node.replace_children(Vec::new()) {
                self.destroy_subtree(child);
            }
        }
    }

    // Existing child nodes are reused for items still present.
    fn set_children(&self, parent_id: NodeId, children: &[Item]) {
        if self.is_torn_down() {
            return;
        }
        let Some(parent) = self.node(parent_id) else {
            return;
        };
        if !parent.is_expanded() {
            return;
        }

        let mut existing: Vec<Option<Arc<TreeNode>>> = parent
            .children()
            .into_iter()
            .map(|id| self.node(id))
            .collect();
        let mut ids = Vec::with_capacity(children.len());
        for item in children {
            let reused = existing
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|node| node.item() == item))
                .and_then(|slot| slot.take());
            let node = match reused {
                Some(node) => node,
                None => self.create_node(item, Some(parent_id)),
            };
            ids.push(node.id());
        }
        parent.replace_children(ids);
        for stale in existing.into_iter().flatten() {
            self.destroy_subtree(stale.id());
        }
    }

    // =========================================================================
    // Model notifications
    // =========================================================================

    fn on_item_change(&self, item: &Item, attr: &str, value: &ItemValue) {
        if self.is_torn_down() {
            return;
        }
        let Some(property) = self.router.lock().resolve_attr(attr) else {
            tracing::trace!(target: targets::TREE, attr, "unrouted attribute");
            return;
        };
        let identity = self.model.get_identity(item);
        self.index.broadcast(&identity, property, value);
    }

    fn on_children_change(&self, parent: &Item, children: &[Item]) {
        if self.is_torn_down() {
            return;
        }
        let identity = self.model.get_identity(parent);
        let ids = self.index.ids_for(&identity);
        let expandable = !children.is_empty() || self.model.may_have_children(parent);
        for id in ids {
            let Some(node) = self.node(id) else {
                continue;
            };
            if node.is_expandable() != expandable {
                node.set_expandable(expandable);
                if self.config.branch_read_only && node.has_checkbox() {
                    node.apply(NodeProperty::ReadOnly, &expandable.into());
                }
            }
            if node.is_expanded() {
                self.set_children(id, children);
            }
        }
    }

    fn on_item_delete(&self, item: &Item) {
        if self.is_torn_down() {
            return;
        }
        let identity = self.model.get_identity(item);
        let ids = self.index.ids_for(&identity);
        for id in ids {
            let parent = self
                .node(id)
                .and_then(|node| node.parent())
                .and_then(|parent| self.node(parent));
            if let Some(parent) = parent {
                parent.remove_child(id);
            }
            self.destroy_subtree(id);
        }
    }

    fn on_label_attr_change(&self, old: Option<&str>, new: &str) {
        if self.is_torn_down() {
            return;
        }
        self.router.lock().route_attr(old, new, NodeProperty::Label);
        let nodes = self.index.all();
        for node in nodes {
            let label = self.model.get_label(node.item());
            node.apply(NodeProperty::Label, &ItemValue::String(label));
        }
    }

    // =========================================================================
    // Interaction
    // =========================================================================

    /// Handles a user change of a node's checkbox to `state`.
    ///
    /// Read-only checkboxes ignore the change. A state the model rejects is
    /// reverted on the widget and returned as an error.
    pub fn on_checkbox_activated(&self, id: NodeId, state: CheckedState) -> Result<()> {
        let Some(node) = self.node(id) else {
            return Ok(());
        };
        if !node.has_checkbox() {
            return Ok(());
        }
        if node.is_read_only() {
            tracing::debug!(target: targets::TREE, identity = node.identity(), "read-only checkbox ignored");
            self.revert(&node);
            return Ok(());
        }
        let Some(checkbox_model) = self.model.checkbox_model() else {
            return Ok(());
        };
        if let Err(err) = checkbox_model.set_checked(node.item(), state) {
            tracing::warn!(target: targets::TREE, identity = node.identity(), %err, "checkbox change rejected");
            self.revert(&node);
            return Err(err);
        }
        self.checkbox_clicked.emit((node.item().clone(), id, state));
        Ok(())
    }

    fn revert(&self, node: &TreeNode) {
        let state = self
            .model
            .checkbox_model()
            .and_then(|checkbox_model| checkbox_model.get_checked(node.item()));
        if let Some(state) = state {
            node.with_checkbox_mut(|widget| widget.set_checked(state));
        }
    }

    /// Toggles a node's checkbox as the user would. Returns the requested
    /// state, or `None` if the node has no checkbox or it is read-only.
    pub fn toggle_node(&self, id: NodeId) -> Result<Option<CheckedState>> {
        let Some(node) = self.node(id) else {
            return Ok(None);
        };
        if node.is_read_only() {
            return Ok(None);
        }
        let next = node.with_checkbox_mut(|widget| {
            let native = if widget.supports_toggle() {
                widget.toggle()
            } else {
                None
            };
            native.unwrap_or_else(|| widget.checked().toggled())
        });
        let Some(next) = next else {
            return Ok(None);
        };
        self.on_checkbox_activated(id, next)?;
        Ok(Some(next))
    }

    /// Routes a click on a node.
    pub fn on_node_click(&self, id: NodeId, target: ClickTarget) -> Result<()> {
        let Some(node) = self.node(id) else {
            return Ok(());
        };
        match target {
            ClickTarget::Checkbox => {
                self.toggle_node(id)?;
                self.clicked.emit((node.item().clone(), id));
            }
            ClickTarget::Expando if node.is_expanded() => self.collapse(id),
            ClickTarget::Expando => self.expand(id),
            ClickTarget::Label => self.clicked.emit((node.item().clone(), id)),
        }
        Ok(())
    }

    /// Handles a key press on a node. Space toggles the checkbox unless Alt
    /// is held.
    pub fn on_key_press(&self, id: NodeId, key: TreeKey, alt: bool) -> Result<()> {
        match key {
            TreeKey::Space if !alt => {
                self.toggle_node(id)?;
            }
            TreeKey::Space => {}
            TreeKey::Enter => {
                if let Some(node) = self.node(id) {
                    self.clicked.emit((node.item().clone(), id));
                }
            }
            TreeKey::Right => self.expand(id),
            TreeKey::Left => self.collapse(id),
        }
        Ok(())
    }

    /// Sets the checked state of a node's item through the model. Works on
    /// read-only checkboxes.
    pub fn set_checked(&self, id: NodeId, state: CheckedState) -> Result<()> {
        let Some(node) = self.node(id) else {
            return Ok(());
        };
        let checkbox_model = self
            .model
            .checkbox_model()
            .ok_or(ConfigError::ModelLacksCheckboxSupport)?;
        checkbox_model.set_checked(node.item(), state)
    }

    /// The state a node's checkbox shows.
    pub fn checked(&self, id: NodeId) -> Option<CheckedState> {
        self.node(id).and_then(|node| node.checked())
    }

    /// Disconnects from the model and discards every node.
    pub fn destroy(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let signals = self.model.signals();
        for connection in self.connections.lock().drain(..) {
            match connection {
                ModelConnection::ItemChanged(id) => signals.item_changed.disconnect(id),
                ModelConnection::ChildrenChanged(id) => signals.children_changed.disconnect(id),
                ModelConnection::ItemDeleted(id) => signals.item_deleted.disconnect(id),
                ModelConnection::LabelAttrChanged(id) => signals.label_attr_changed.disconnect(id),
            };
        }
        let nodes = self.index.clear();
        *self.root_node.lock() = None;
        self.checkbox_clicked.disconnect_all();
        self.clicked.disconnect_all();
        tracing::debug!(target: targets::TREE, nodes = nodes.len(), "tree destroyed");
    }
}
