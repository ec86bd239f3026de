//! Single-root tree model over an item store.
//!
//! [`StoreModel`] reads the tree out of an [`ItemStore`]: the root is the one
//! item matching the configured query, and an item's children are the items
//! listed under the configured children attributes. It owns checked-state
//! semantics: a definite state written to an item cascades down to its
//! descendants, and every ancestor is re-derived with the configured
//! [`CheckedAggregate`](super::CheckedAggregate) policy.
//!
//! Store notifications are translated into [`ModelSignals`]: a write to a
//! children attribute becomes `children_changed`, any other write becomes
//! `item_changed`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use checktree_core::logging::targets;
use checktree_core::{ConnectionId, PerfSpan};

use super::checked::{CheckMode, CheckedState};
use super::config::ModelConfig;
use super::item::{Item, ItemAttributes, ItemValue};
use super::store::{FetchComplete, FetchFailed, ItemComplete, ItemStore};
use super::traits::{CheckboxModel, ModelSignals, RootComplete, TreeModel};
use crate::error::{ConfigError, Result, StoreError};

/// A single-root [`TreeModel`] backed by an [`ItemStore`].
pub struct StoreModel {
    this: Weak<StoreModel>,
    store: Arc<dyn ItemStore>,
    config: ModelConfig,
    label_attr: RwLock<Option<String>>,
    root: RwLock<Option<Item>>,
    signals: ModelSignals,
    connections: Mutex<Vec<StoreConnection>>,
    torn_down: AtomicBool,
}

enum StoreConnection {
    ItemSet(ConnectionId),
    ItemDeleted(ConnectionId),
}

impl StoreModel {
    /// Creates a model over `store` and subscribes to its notifications.
    pub fn new(store: Arc<dyn ItemStore>, config: ModelConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let on_set = weak.clone();
            let item_set = store.signals().item_set.connect(move |(item, attr, _old, new)| {
                if let Some(model) = on_set.upgrade() {
                    model.on_store_set(item, attr, new.clone());
                }
            });
            let on_delete = weak.clone();
            let item_deleted = store.signals().item_deleted.connect(move |item| {
                if let Some(model) = on_delete.upgrade() {
                    model.on_store_delete(item);
                }
            });

            tracing::debug!(
                target: targets::MODEL,
                checked_attr = %config.checked_attr,
                mode = %config.check_mode(),
                "store model created"
            );

            Self {
                this: weak.clone(),
                label_attr: RwLock::new(config.label_attr.clone()),
                store,
                config,
                root: RwLock::new(None),
                signals: ModelSignals::new(),
                connections: Mutex::new(vec![
                    StoreConnection::ItemSet(item_set),
                    StoreConnection::ItemDeleted(item_deleted),
                ]),
                torn_down: AtomicBool::new(false),
            }
        })
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn ItemStore> {
        &self.store
    }

    /// The model configuration.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Returns `true` once [`destroy`](TreeModel::destroy) has run.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Renames the label attribute and emits `label_attr_changed`.
    pub fn set_label_attr(&self, attr: impl Into<String>) {
        let attr = attr.into();
        let old = self.label_attr();
        if old.as_deref() == Some(attr.as_str()) {
            return;
        }
        *self.label_attr.write() = Some(attr.clone());
        tracing::debug!(target: targets::MODEL, old = ?old, new = %attr, "label attribute changed");
        self.signals.label_attr_changed.emit((old, attr));
    }

    /// The ordered children of `item` across all children attributes.
    pub fn children_of(&self, item: &Item) -> Vec<Item> {
        let mut children = Vec::new();
        for attr in &self.config.children_attrs {
            if let Some(ItemValue::Items(items)) = self.store.get_value(item, attr) {
                children.extend(items);
            }
        }
        children
    }

    /// Re-derives the checked state of every ancestor of `item`.
    pub fn update_checked_parent(&self, item: &Item) -> Result<()> {
        let mut visited = HashSet::new();
        visited.insert(item.clone());
        self.update_parents(item, &mut visited)
    }

    /// Re-derives `parent` from its children, then its ancestors if it
    /// changed.
    pub fn refresh_branch(&self, parent: &Item) -> Result<()> {
        let mut visited = HashSet::new();
        visited.insert(parent.clone());
        if self.update_aggregate(parent)? {
            self.update_parents(parent, &mut visited)?;
        }
        Ok(())
    }

    /// Removes `child` from every children attribute of `parent`. Returns
    /// `true` if it was listed.
    pub fn remove_child(&self, parent: &Item, child: &Item) -> Result<bool> {
        let mut removed = false;
        for attr in &self.config.children_attrs {
            if let Some(ItemValue::Items(items)) = self.store.get_value(parent, attr) {
                if items.contains(child) {
                    let remaining = items.into_iter().filter(|c| c != child).collect();
                    self.store.set_value(parent, attr, ItemValue::Items(remaining))?;
                    removed = true;
                }
            }
        }
        Ok(removed)
    }

    fn checked_of(&self, item: &Item) -> Option<CheckedState> {
        match self
            .store
            .get_value(item, &self.config.checked_attr)
            .and_then(|value| value.as_checked())
        {
            Some(state) => Some(state),
            None if self.config.checkbox_all => Some(self.config.checked_state),
            None => None,
        }
    }

    fn write_checked(&self, item: &Item, state: CheckedState) -> Result<bool> {
        if self.checked_of(item) == Some(state) {
            return Ok(false);
        }
        self.store
            .set_value(item, &self.config.checked_attr, ItemValue::Checked(state))?;
        Ok(true)
    }

    fn cascade(&self, item: &Item, state: CheckedState, visited: &mut HashSet<Item>) -> Result<()> {
        for child in self.children_of(item) {
            if !visited.insert(child.clone()) {
                continue;
            }
            if self.checked_of(&child).is_some() {
                self.write_checked(&child, state)?;
            }
            self.cascade(&child, state, visited)?;
        }
        Ok(())
    }

    fn update_parents(&self, item: &Item, visited: &mut HashSet<Item>) -> Result<()> {
        for parent in self.store.parents_of(item, &self.config.children_attrs) {
            if !visited.insert(parent.clone()) {
                continue;
            }
            if self.update_aggregate(&parent)? {
                self.update_parents(&parent, visited)?;
            }
        }
        Ok(())
    }

    fn update_aggregate(&self, parent: &Item) -> Result<bool> {
        let states: Vec<CheckedState> = self
            .children_of(parent)
            .iter()
            .filter_map(|child| self.checked_of(child))
            .collect();
        match self.config.aggregate.aggregate(&states, self.config.check_mode()) {
            Some(state) => self.write_checked(parent, state),
            None => Ok(false),
        }
    }

    fn primary_children_attr(&self) -> Result<&str> {
        self.config
            .children_attrs
            .first()
            .map(String::as_str)
            .ok_or_else(|| ConfigError::NoChildrenAttribute.into())
    }

    fn on_store_set(&self, item: &Item, attr: &str, new: Option<ItemValue>) {
        if self.is_torn_down() {
            return;
        }
        if self.config.children_attrs.iter().any(|a| a == attr) {
            let children = self.children_of(item);
            tracing::trace!(target: targets::MODEL, identity = item.identity(), count = children.len(), "children changed");
            self.signals.children_changed.emit((item.clone(), children));
        } else if let Some(value) = new {
            self.signals
                .item_changed
                .emit((item.clone(), attr.to_string(), value));
        }
    }

    fn on_store_delete(&self, item: &Item) {
        if self.is_torn_down() {
            return;
        }
        {
            let mut root = self.root.write();
            if root.as_ref() == Some(item) {
                *root = None;
            }
        }
        self.signals.item_deleted.emit(item.clone());
    }
}

impl TreeModel for StoreModel {
    fn get_root(&self, on_item: RootComplete, on_error: FetchFailed) {
        let cached = self.root.read().clone();
        if let Some(root) = cached {
            on_item(root);
            return;
        }

        let weak = self.this.clone();
        let on_error = Arc::new(Mutex::new(Some(on_error)));
        let fail = Arc::clone(&on_error);
        self.store.fetch(
            &self.config.query,
            Box::new(move |items| {
                let Some(model) = weak.upgrade() else { return };
                if model.is_torn_down() {
                    return;
                }
                if items.len() == 1 {
                    let root = items[0].clone();
                    *model.root.write() = Some(root.clone());
                    on_item(root);
                } else {
                    tracing::warn!(target: targets::MODEL, matches = items.len(), "root query is ambiguous");
                    let handler = fail.lock().take();
                    if let Some(handler) = handler {
                        handler(StoreError::AmbiguousRoot(items.len()));
                    }
                }
            }),
            Box::new(move |err| {
                let handler = on_error.lock().take();
                if let Some(handler) = handler {
                    handler(err);
                }
            }),
        );
    }

    fn may_have_children(&self, item: &Item) -> bool {
        self.config.children_attrs.iter().any(|attr| item.has(attr))
    }

    fn get_children(&self, parent: &Item, on_complete: FetchComplete, _on_error: FetchFailed) {
        on_complete(self.children_of(parent));
    }

    fn is_item(&self, item: &Item) -> bool {
        self.store.is_item(item)
    }

    fn fetch_item_by_identity(&self, identity: &str, on_item: ItemComplete, on_error: FetchFailed) {
        self.store.fetch_item_by_identity(identity, on_item, on_error);
    }

    fn get_identity(&self, item: &Item) -> String {
        self.store.get_identity(item)
    }

    fn get_label(&self, item: &Item) -> String {
        self.label_attr()
            .and_then(|attr| self.store.get_value(item, &attr))
            .and_then(|value| value.to_text())
            .unwrap_or_else(|| self.store.get_identity(item))
    }

    fn label_attr(&self) -> Option<String> {
        self.label_attr
            .read()
            .clone()
            .or_else(|| self.store.label_attr())
    }

    fn get_item_attr(&self, item: &Item, attr: &str) -> Option<ItemValue> {
        self.store.get_value(item, attr)
    }

    fn new_item(&self, identity: &str, attributes: ItemAttributes, parent: &Item) -> Result<Item> {
        let attr = self.primary_children_attr()?;
        let item = self.store.new_item(identity, attributes, Some((parent, attr)))?;
        self.update_checked_parent(&item)?;
        Ok(item)
    }

    fn paste_item(
        &self,
        child: &Item,
        old_parent: Option<&Item>,
        new_parent: &Item,
        copy: bool,
    ) -> Result<()> {
        let attr = self.primary_children_attr()?;
        let moved_from = if copy { None } else { old_parent };

        if let Some(old) = moved_from {
            self.remove_child(old, child)?;
        }

        let mut siblings = self
            .store
            .get_value(new_parent, attr)
            .and_then(|value| value.as_items().map(<[Item]>::to_vec))
            .unwrap_or_default();
        if !siblings.contains(child) {
            siblings.push(child.clone());
            self.store
                .set_value(new_parent, attr, ItemValue::Items(siblings))?;
        }

        if let Some(old) = moved_from {
            self.refresh_branch(old)?;
        }
        self.update_checked_parent(child)
    }

    fn checkbox_model(&self) -> Option<&dyn CheckboxModel> {
        Some(self)
    }

    fn signals(&self) -> &ModelSignals {
        &self.signals
    }

    fn destroy(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        for connection in self.connections.lock().drain(..) {
            match connection {
                StoreConnection::ItemSet(id) => self.store.signals().item_set.disconnect(id),
                StoreConnection::ItemDeleted(id) => {
                    self.store.signals().item_deleted.disconnect(id)
                }
            };
        }
        self.signals.disconnect_all();
        tracing::debug!(target: targets::MODEL, "store model destroyed");
    }
}

impl CheckboxModel for StoreModel {
    fn check_mode(&self) -> CheckMode {
        self.config.check_mode()
    }

    fn checked_attr(&self) -> String {
        self.config.checked_attr.clone()
    }

    fn get_checked(&self, item: &Item) -> Option<CheckedState> {
        self.checked_of(item)
    }

    fn set_checked(&self, item: &Item, state: CheckedState) -> Result<()> {
        let state = self.check_mode().validate(state).inspect_err(|err| {
            tracing::warn!(target: targets::MODEL, identity = item.identity(), %err, "rejected checked state");
        })?;
        if !self.store.is_item(item) {
            return Err(StoreError::UnknownItem(item.identity().to_string()).into());
        }

        let _span = PerfSpan::new("StoreModel::set_checked");
        self.write_checked(item, state)?;
        if !state.is_mixed() {
            let mut visited = HashSet::new();
            visited.insert(item.clone());
            self.cascade(item, state, &mut visited)?;
        }
        self.update_checked_parent(item)
    }
}
